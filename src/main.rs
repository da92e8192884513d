fn main() {
    if let Err(e) = minimon_sessions_lib::run() {
        eprintln!("minimon-sessions: {}", e);
        std::process::exit(1);
    }
}
