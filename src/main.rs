fn main() -> anyhow::Result<()> {
    ucd_cli::run()
}
