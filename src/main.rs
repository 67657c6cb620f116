fn main() -> anyhow::Result<()> {
    scribe_cli::run()
}
