fn main() {
    std::process::exit(adb_manager_lib::run());
}
