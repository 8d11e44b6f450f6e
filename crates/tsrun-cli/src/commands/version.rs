use miette::Result;
use tsrun_core::version::version_string;

pub fn run() -> Result<i32> {
    println!("{}", version_string());
    Ok(0)
}
