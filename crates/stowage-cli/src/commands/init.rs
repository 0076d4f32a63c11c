//! Init command - print a defaulted config of the current version

use std::path::Path;

use crate::commands::{pipeline, write_output};
use crate::error::Result;

pub fn run(output: Option<&Path>) -> Result<()> {
    let pipeline = pipeline()?;
    let document = pipeline.loader().init_config()?;
    write_output(&document.to_yaml()?, output)
}
