pub mod commands;
pub mod handlers;
pub mod logging;

pub use commands::{CLAP_STYLING, command_argument_builder};
pub use handlers::{
    apply_overrides, load_config, output_path, parse_format, render_export, render_status, write_output,
};
pub use logging::init_logging;
