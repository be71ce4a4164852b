//! Layered service configuration.
//!
//! Resolves one immutable [`Config`] from three sources, lowest precedence
//! first:
//! 1. **Base** - the document passed in (`/app/conf/confyg.yaml` by default)
//! 2. **Overlay** - `<stem>.<env>.<ext>` next to the base, when an
//!    environment name is given (`confyg.staging.yaml`)
//! 3. **Environment** - `APP_<KEY_PATH>` variables, e.g. `APP_SERVER_PORT`
//!
//! ## Merge Strategy
//! - Tables merge key by key; lists and scalars are replaced whole
//! - A missing overlay is skipped; a malformed one is skipped with a warning
//! - A missing or malformed base document is fatal
//!
//! ## Documents
//! YAML (`.yaml`, `.yml`, or no extension), JSON (`.json`) and TOML
//! (`.toml`). Keys are case-insensitive.
//!
//! ## Value syntax
//! - Durations: `"30s"`, `"5m"`, `"1h30m"`, `"250ms"`, `"0"`; bare integers are seconds
//! - Booleans: `true`/`false` or `1 t T TRUE True 0 f F FALSE False`
//! - Lists: sequences, or comma-separated strings (`APP_SERVER_CORS_ALLOW_METHODS=GET,POST`)

mod coerce;
mod fields;
mod keypath;
mod merge;
mod resolver;
mod sources;
mod types;

pub use keypath::KeyPath;
pub use merge::deep_merge;
pub use resolver::{ConfigResolver, DEFAULT_ENV_PREFIX, Resolution, ResolutionReport, resolve};
pub use sources::{ConfigSource, EnvSource, Format, ProcessEnv};
pub use types::*;
