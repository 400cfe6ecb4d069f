fn main() {
    jay_fifo::cli::main();
}
