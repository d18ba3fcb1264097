//! Convoy binary entry point.

fn main() {
    if let Err(err) = convoy::cli::run() {
        convoy::ui::output::error(format!("{err:#}"));
        std::process::exit(1);
    }
}
