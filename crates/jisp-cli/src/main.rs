fn main() {
    std::process::exit(jisp_cli::run_from_env());
}
