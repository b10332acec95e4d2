fn main() {
    cookieferry::cli::run();
}
