//! Configuration loaded from the environment.

use crate::application::OrchestratorSettings;
use std::env;
use std::path::PathBuf;

/// Configuration for the analysis service.
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// HTTP server bind address
    pub addr: String,
    /// HTTP server port
    pub port: String,
    /// Interpreter the analysis and plotting scripts run under
    pub interpreter: String,
    /// Movement detection script
    pub script: PathBuf,
    /// Plot generation script
    pub plotter: PathBuf,
    /// Blank annotation document the annotation output is built from
    pub template: PathBuf,
    /// Directory every job writes its result into
    pub output_dir: PathBuf,
    /// Author recorded in generated annotation documents
    pub author: String,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        Self {
            addr: env::var("ADDR").unwrap_or_else(|_| String::from("127.0.0.1")),
            port: env::var("PORT").unwrap_or_else(|_| String::from("3000")),
            interpreter: env::var("SPUDNIG_INTERPRETER")
                .unwrap_or_else(|_| String::from("python")),
            script: path_var("SPUDNIG_SCRIPT", "src/spudnig/spudnig_new.py"),
            plotter: path_var("SPUDNIG_PLOTTER", "src/spudnig/plotter.py"),
            template: path_var("SPUDNIG_TEMPLATE", "templates/BlankTemplate.eaf"),
            output_dir: env::var("SPUDNIG_OUTPUT_DIR")
                .map(PathBuf::from)
                .or_else(|_| env::current_dir())
                .unwrap_or_else(|_| PathBuf::from(".")),
            author: env::var("SPUDNIG_AUTHOR").unwrap_or_else(|_| String::from("Me")),
        }
    }

    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            interpreter: self.interpreter.clone(),
            script: self.script.clone(),
            plotter: self.plotter.clone(),
            output_dir: self.output_dir.clone(),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.addr, self.port)
    }
}

fn path_var(key: &str, default: &str) -> PathBuf {
    env::var(key)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(default))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_follow_config() {
        let config = AppConfig {
            addr: String::from("0.0.0.0"),
            port: String::from("8080"),
            interpreter: String::from("python3"),
            script: PathBuf::from("a.py"),
            plotter: PathBuf::from("b.py"),
            template: PathBuf::from("t.eaf"),
            output_dir: PathBuf::from("/data/out"),
            author: String::from("Me"),
        };
        let settings = config.orchestrator_settings();
        assert_eq!(settings.interpreter, "python3");
        assert_eq!(settings.output_dir, PathBuf::from("/data/out"));
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
    }

    #[test]
    fn test_path_var_default() {
        assert_eq!(
            path_var("SPUDNIG_TEST_UNSET_VARIABLE", "x/y.py"),
            PathBuf::from("x/y.py")
        );
    }
}
