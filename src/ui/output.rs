//! Output functions for build progress

use crate::orchestration::short_id;
use console::style;

/// Announce a step before it runs
pub fn step(op: &str, args: &str) {
    println!("{} {} {}", style("---").dim(), style(op).cyan().bold(), args);
}

/// Report that a step was satisfied from the cache
pub fn cache_hit(image_id: &str) {
    println!(
        "{} Cache hit: using {}",
        style("+++").green(),
        style(short_id(image_id)).cyan()
    );
}

/// Report the image a step committed
pub fn committed(image_id: &str) {
    println!(
        "{} Committed {}",
        style("+++").dim(),
        style(short_id(image_id)).cyan()
    );
}

/// Banner printed before streamed container output
pub fn output_begin() {
    println!("{}", style("------ BEGIN OUTPUT ------").dim());
}

/// One line of container output
pub fn output_line(line: &str) {
    println!("{}", line);
}

/// Banner printed after streamed container output
pub fn output_end() {
    println!("{}", style("------ END OUTPUT ------").dim());
}

/// Report a tag applied to the final image
pub fn tagged(tag: &str) {
    println!("{} Tagged: {}", style("+++").green(), style(tag).cyan());
}

/// Report the final image of a build
pub fn built(image_id: &str) {
    println!(
        "{} Built image {}",
        style("✓").green(),
        style(image_id).cyan().bold()
    );
}

/// Report a completed action
pub fn success(message: &str) {
    println!("{} {}", style("✓").green(), message);
}

/// Warn about a skipped action with a hint on how to proceed
pub fn warn_hint(message: &str, hint: &str) {
    eprintln!("{} {}", style("!").yellow().bold(), message);
    eprintln!("  {}", style(hint).dim());
}
