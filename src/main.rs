fn main() {
    if let Err(err) = blogdesk::cli::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
