use {
    crate::cli::{GenerateArgs, JayFifo},
    clap::CommandFactory,
    std::io::stdout,
};

pub fn main(args: GenerateArgs) {
    let stdout = stdout();
    let mut stdout = stdout.lock();
    clap_complete::generate(args.shell, &mut JayFifo::command(), "jay-fifo", &mut stdout);
}
