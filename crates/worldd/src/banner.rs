//! Startup banner.

const WIDTH: usize = 80;

/// Title centered between two separator rules.
pub fn render(version: &str) -> String {
    let title = format!("WORLD SERVER v{version} - WorldGrid");
    let width = WIDTH.max(title.len());
    let rule = "=".repeat(width);
    format!("{rule}\n{title:^width$}\n{rule}")
}

pub fn print() {
    println!("{}", render(env!("CARGO_PKG_VERSION")));
}
