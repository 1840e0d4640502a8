use std::path::PathBuf;

use super::{LanguageDescriptor, Toolchain};

/// First candidate found on PATH, else the first name as-is.
fn discover(candidates: &[&str]) -> PathBuf {
    candidates
        .iter()
        .find_map(|name| which::which(name).ok())
        .unwrap_or_else(|| PathBuf::from(candidates[0]))
}

pub fn default_languages() -> Vec<LanguageDescriptor> {
    vec![
        LanguageDescriptor::new(
            "python",
            "main.py",
            Toolchain::Interpreted {
                interpreter: discover(&["python3", "python", "py"]),
                args: Vec::new(),
            },
        )
        .with_aliases(&["py"]),
        LanguageDescriptor::new(
            "javascript",
            "main.js",
            Toolchain::Interpreted {
                interpreter: discover(&["node", "qjs"]),
                args: Vec::new(),
            },
        )
        .with_aliases(&["js"]),
        LanguageDescriptor::new(
            "c",
            "main.c",
            Toolchain::Compiled {
                compiler: discover(&["gcc", "cc", "clang"]),
                flags: vec!["-std=c11".to_string(), "-O2".to_string()],
                executable: "main".to_string(),
            },
        ),
        LanguageDescriptor::new(
            "cpp",
            "main.cpp",
            Toolchain::Compiled {
                compiler: discover(&["g++", "c++", "clang++"]),
                flags: vec!["-std=c++17".to_string(), "-O2".to_string()],
                executable: "main++".to_string(),
            },
        )
        .with_aliases(&["c++"]),
    ]
}
