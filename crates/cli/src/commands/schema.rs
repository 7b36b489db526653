use anthill_core::manager::build_file_schema;
use anyhow::Result;

pub fn execute() -> Result<()> {
    println!("{}", build_file_schema()?);
    Ok(())
}
