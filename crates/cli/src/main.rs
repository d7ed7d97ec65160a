fn main() -> Result<(), Box<dyn std::error::Error>> {
    autoreg_cli::run()
}
