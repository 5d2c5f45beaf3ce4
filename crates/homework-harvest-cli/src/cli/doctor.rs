//! Environment readiness check.

use crate::cli::ConfigArgs;
use anyhow::Result;
use homework_harvest::renderer::chromium::find_chromium;
use homework_harvest::HarvestConfig;
use std::path::PathBuf;

/// What a query would be able to use on this machine.
pub struct Readiness {
    pub chromium: Option<PathBuf>,
    pub ocr_program: Option<String>,
    pub ocr_found: Option<PathBuf>,
}

impl Readiness {
    pub fn probe(config: &HarvestConfig) -> Self {
        let ocr_program = config
            .ocr_command
            .as_ref()
            .and_then(|cmd| cmd.first())
            .cloned();
        let ocr_found = ocr_program.as_deref().and_then(|p| which::which(p).ok());
        Self {
            chromium: find_chromium(config.chromium_path.as_deref()),
            ocr_program,
            ocr_found,
        }
    }
}

/// Check Chromium and OCR availability and print the resolved endpoints.
pub async fn run(config: &ConfigArgs) -> Result<()> {
    let config = config.resolve()?;
    let readiness = Readiness::probe(&config);

    println!("hwharvest doctor");
    println!("================");
    println!();
    println!("OS:   {}", std::env::consts::OS);
    println!("Arch: {}", std::env::consts::ARCH);
    println!();
    println!("Platform API: {}", config.api_root());
    println!("SSO login:    {}", config.sso_login_url);
    println!();

    match &readiness.chromium {
        Some(path) => println!("[OK] Chromium found: {}", path.display()),
        None => println!("[!!] Chromium NOT found. SSO login is unavailable; set HOMEWORK_CHROMIUM_PATH."),
    }

    match (&readiness.ocr_program, &readiness.ocr_found) {
        (Some(_), Some(path)) => println!("[OK] OCR command found: {}", path.display()),
        (Some(program), None) => println!("[!!] OCR command '{program}' is not on PATH"),
        (None, _) => println!("[??] No OCR command configured; captchas will be submitted blank"),
    }

    println!();
    if readiness.ocr_found.is_some() {
        println!("Status: READY (direct login{})", if readiness.chromium.is_some() { ", SSO login" } else { "" });
    } else {
        println!("Status: DEGRADED");
        println!("  Set HOMEWORK_OCR_COMMAND so captchas can be solved.");
    }

    Ok(())
}
