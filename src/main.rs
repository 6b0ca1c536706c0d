fn main() {
    if let Err(e) = trio_tag_lib::run() {
        eprintln!("trio-tag: {e}");
        std::process::exit(1);
    }
}
