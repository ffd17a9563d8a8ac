//! # Tool Path Resolver
//!
//! Trova i decoder esterni usati dalle trasformazioni di conversione:
//! - nella directory indicata dalla variabile d'ambiente `TOOLS_DIR`
//! - nel `PATH` di sistema, a meno che il resolver sia bundle-only

use std::env;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Tools that can decode HEIC/HEIF, in order of preference
pub const HEIC_DECODERS: &[&str] = &["heif-convert", "magick", "convert"];

/// Tools that can decode CR2 raw files, in order of preference
pub const RAW_DECODERS: &[&str] = &["magick", "convert"];

/// Tool path resolver for bundled and system-installed decoders
#[derive(Debug, Clone)]
pub struct ToolPathResolver {
    /// Directory searched before `PATH`
    tools_dir: Option<PathBuf>,
    search_system_path: bool,
}

impl ToolPathResolver {
    /// Create a resolver honouring `TOOLS_DIR`
    pub fn new() -> Self {
        match env::var_os("TOOLS_DIR").map(PathBuf::from) {
            Some(dir) if dir.is_dir() => {
                debug!("Using tools directory from TOOLS_DIR: {}", dir.display());
                Self::with_tools_dir(dir)
            }
            _ => Self {
                tools_dir: None,
                search_system_path: true,
            },
        }
    }

    /// Create a resolver searching `tools_dir` before `PATH`
    pub fn with_tools_dir(tools_dir: impl Into<PathBuf>) -> Self {
        Self {
            tools_dir: Some(tools_dir.into()),
            search_system_path: true,
        }
    }

    /// Create a resolver that only looks in `tools_dir`, for self-contained
    /// bundles
    pub fn bundled_only(tools_dir: impl Into<PathBuf>) -> Self {
        Self {
            tools_dir: Some(tools_dir.into()),
            search_system_path: false,
        }
    }

    /// Resolve the path to a specific tool
    pub fn resolve_tool(&self, tool_name: &str) -> Option<PathBuf> {
        let file_name = Self::executable_name(tool_name);

        if let Some(ref tools_dir) = self.tools_dir {
            let bundled = tools_dir.join(&file_name);
            if bundled.is_file() {
                debug!("Using bundled tool: {} -> {}", tool_name, bundled.display());
                return Some(bundled);
            }
        }

        if !self.search_system_path {
            debug!("Tool not bundled: {}", tool_name);
            return None;
        }

        let found = Self::find_in_system_path(&file_name);
        match found {
            Some(ref path) => debug!("Using system tool: {} -> {}", tool_name, path.display()),
            None => debug!("Tool not found: {}", tool_name),
        }
        found
    }

    /// Check if a specific tool is available
    pub fn is_tool_available(&self, tool_name: &str) -> bool {
        self.resolve_tool(tool_name).is_some()
    }

    /// Names from `tools` that resolve to an executable
    pub fn available_tools(&self, tools: &[&str]) -> Vec<String> {
        tools
            .iter()
            .filter(|tool| self.is_tool_available(tool))
            .map(|tool| tool.to_string())
            .collect()
    }

    /// Get installation instructions for a decoder on Linux
    pub fn install_hint(tool_name: &str) -> &'static str {
        match tool_name {
            "heif-convert" => "sudo apt-get install libheif-examples",
            "magick" | "convert" => "sudo apt-get install imagemagick",
            _ => "see your package manager",
        }
    }

    fn executable_name(tool_name: &str) -> String {
        if cfg!(windows) {
            format!("{}.exe", tool_name)
        } else {
            tool_name.to_string()
        }
    }

    fn find_in_system_path(file_name: &str) -> Option<PathBuf> {
        env::split_paths(&env::var_os("PATH")?)
            .map(|dir| Path::new(&dir).join(file_name))
            .find(|path| path.is_file())
    }
}

impl Default for ToolPathResolver {
    fn default() -> Self {
        Self::new()
    }
}
