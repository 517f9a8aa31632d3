use clap::Parser;
use colored::Colorize;
use review_engine::cli::{run, Cli};

fn main() {
    let cli = Cli::parse();
    if let Err(message) = run(cli) {
        eprintln!("{} {message}", "Error:".red());
        std::process::exit(1);
    }
}
