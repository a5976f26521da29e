fn main() -> anyhow::Result<()> {
    rubyir::driver::main()
}
