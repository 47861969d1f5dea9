mod app;
mod assets;
mod renderer;

use std::path::PathBuf;
use color_eyre::Result;
use app::App;

fn main() -> Result<()> {
    color_eyre::install()?;
    env_logger::init();

    // Optional texture for the demo cube, otherwise a checkerboard is generated
    let texture_path = std::env::args_os().nth(1).map(PathBuf::from);

    let app = App::new(texture_path)?;
    app.run()?;

    Ok(())
}
