const DIVIDER: &str = "------";

pub fn banner() -> String {
    format!("{}\n{} version: {}\n{}", DIVIDER, kiln_core::name(), kiln_core::version(), DIVIDER)
}

pub fn show() {
    println!("{}", banner());
}
