use std::fmt;
use std::io::Error;
use std::str::FromStr;

/// Environment variable holding the name of the running environment.
const ENVIRONMENT_VAR: &str = "APP_ENVIRONMENT";

const PROD: &str = "prod";
const STAGING: &str = "staging";
const DEV: &str = "dev";

/// Environment the worker runs in.
///
/// Selects which `configuration/{environment}.yaml` file is layered on top of the
/// base file and whether logs go to rolling files or to the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Prod,
    Staging,
    Dev,
}

impl Environment {
    /// Reads the environment from `APP_ENVIRONMENT`, falling back to [`Environment::Prod`].
    pub fn load() -> Result<Environment, Error> {
        match std::env::var(ENVIRONMENT_VAR) {
            Ok(value) => value.parse(),
            Err(_) => Ok(Environment::Prod),
        }
    }

    /// Exports this environment through `APP_ENVIRONMENT` for the current process.
    pub fn set(&self) {
        // SAFETY: only called during process or test setup, before worker tasks are spawned.
        unsafe { std::env::set_var(ENVIRONMENT_VAR, self.to_string()) }
    }

    /// Returns `true` for [`Environment::Prod`] and [`Environment::Staging`].
    pub fn is_prod(&self) -> bool {
        !matches!(self, Self::Dev)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Environment::Prod => PROD,
            Environment::Staging => STAGING,
            Environment::Dev => DEV,
        };

        f.write_str(name)
    }
}

impl FromStr for Environment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            PROD => Ok(Self::Prod),
            STAGING => Ok(Self::Staging),
            DEV => Ok(Self::Dev),
            other => Err(Error::other(format!(
                "unsupported environment `{other}`, expected one of `{PROD}`, `{STAGING}` or `{DEV}`"
            ))),
        }
    }
}
