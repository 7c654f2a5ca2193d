use apispec::cli;

fn main() {
    let command_line_interface = cli::CommandLineInterface::load();
    if let Err(err) = command_line_interface.run() {
        eprintln!("{}", cli::fatal_message(&err));
        std::process::exit(1);
    }
}
