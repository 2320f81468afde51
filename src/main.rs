fn main() {
    doe_database::cli::run();
}
