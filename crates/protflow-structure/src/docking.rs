//! Molecular docking using AutoDock Vina.
//!
//! Receptor and ligand are converted to PDBQT with Open Babel, a Vina config file
//! is written next to the outputs, and the binding-mode table is read back from
//! the Vina log.

use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

/// Configuration for a docking run.
#[derive(Debug, Clone)]
pub struct DockingConfig {
    pub receptor: PathBuf,
    pub ligand: PathBuf,
    pub center_x: f64,
    pub center_y: f64,
    pub center_z: f64,
    pub size_x: f64,
    pub size_y: f64,
    pub size_z: f64,
    pub exhaustiveness: u32,
    pub num_modes: u32,
    pub energy_range: u32,
    pub cpu: u32,
    pub seed: Option<u64>,
}

impl DockingConfig {
    /// Vina config file contents for prepared receptor/ligand files.
    pub fn vina_config(&self, receptor_pdbqt: &Path, ligand_pdbqt: &Path) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "receptor = {}", receptor_pdbqt.display());
        let _ = writeln!(out, "ligand = {}", ligand_pdbqt.display());
        let _ = writeln!(out);
        let _ = writeln!(out, "center_x = {}", self.center_x);
        let _ = writeln!(out, "center_y = {}", self.center_y);
        let _ = writeln!(out, "center_z = {}", self.center_z);
        let _ = writeln!(out);
        let _ = writeln!(out, "size_x = {}", self.size_x);
        let _ = writeln!(out, "size_y = {}", self.size_y);
        let _ = writeln!(out, "size_z = {}", self.size_z);
        let _ = writeln!(out);
        let _ = writeln!(out, "exhaustiveness = {}", self.exhaustiveness);
        let _ = writeln!(out, "num_modes = {}", self.num_modes);
        let _ = writeln!(out, "energy_range = {}", self.energy_range);
        let _ = writeln!(out, "cpu = {}", self.cpu);
        if let Some(seed) = self.seed {
            let _ = writeln!(out, "seed = {seed}");
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BindingMode {
    pub mode: u32,
    /// kcal/mol
    pub affinity: f64,
    pub rmsd_lb: f64,
    pub rmsd_ub: f64,
}

fn parse_mode_row(cols: &[&str]) -> Option<BindingMode> {
    let [mode, affinity, lb, ub, ..] = cols else {
        return None;
    };
    Some(BindingMode {
        mode: mode.parse().ok()?,
        affinity: affinity.parse().ok()?,
        rmsd_lb: lb.parse().ok()?,
        rmsd_ub: ub.parse().ok()?,
    })
}

/// Read the result table that follows the `-----+` separator in a Vina log.
pub fn parse_vina_log(log: &str) -> Vec<BindingMode> {
    let mut modes = Vec::new();
    let mut in_table = false;
    for line in log.lines() {
        if line.trim_start().starts_with("-----+") {
            in_table = true;
            continue;
        }
        if !in_table {
            continue;
        }
        let parsed = parse_mode_row(&line.split_whitespace().collect::<Vec<_>>());
        match parsed {
            Some(m) => modes.push(m),
            None => break,
        }
    }
    modes
}

#[derive(Debug, Clone, Serialize)]
pub struct DockingOutput {
    pub protein_pdbqt: PathBuf,
    pub ligand_pdbqt: PathBuf,
    pub config_file: PathBuf,
    pub docked_poses: PathBuf,
    pub log_file: PathBuf,
    pub binding_modes: Vec<BindingMode>,
}

fn stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "input".to_string())
}

/// Wrapper for AutoDock Vina execution.
pub struct VinaRunner {
    executable_path: PathBuf,
    obabel_path: PathBuf,
}

impl VinaRunner {
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(executable_path: P, obabel_path: Q) -> Self {
        Self {
            executable_path: executable_path.as_ref().to_path_buf(),
            obabel_path: obabel_path.as_ref().to_path_buf(),
        }
    }

    /// Convert `input` to PDBQT. Receptors are written rigid (`-xr`).
    async fn prepare(&self, input: &Path, output: &Path, receptor: bool) -> Result<()> {
        if !input.is_file() {
            bail!("Input file not found at {}", input.display());
        }
        let mut cmd = Command::new(&self.obabel_path);
        cmd.arg(input).arg("-O").arg(output).arg("-h").kill_on_drop(true);
        if receptor {
            cmd.arg("-xr");
        }
        let output_status = cmd
            .output()
            .await
            .with_context(|| format!("Failed to start {}", self.obabel_path.display()))?;
        if !output_status.status.success() {
            let stderr = String::from_utf8_lossy(&output_status.stderr);
            bail!("Error during PDBQT preparation of {}: {}", input.display(), stderr.trim());
        }
        Ok(())
    }

    /// Prepare inputs, write the config and run AutoDock Vina in `output_dir`.
    pub async fn run(&self, config: &DockingConfig, output_dir: &Path) -> Result<DockingOutput> {
        info!("Running AutoDock Vina on {:?}", config.ligand);
        tokio::fs::create_dir_all(output_dir).await?;

        let (protein, ligand) = (stem(&config.receptor), stem(&config.ligand));
        let protein_pdbqt = output_dir.join(format!("{protein}_prepared.pdbqt"));
        let ligand_pdbqt = output_dir.join(format!("{ligand}_prepared.pdbqt"));
        let config_file = output_dir.join("config.txt");
        let docked_poses = output_dir.join(format!("{protein}_{ligand}_docked_poses.pdbqt"));
        let log_file = output_dir.join(format!("{protein}_{ligand}_vina_log.txt"));

        self.prepare(&config.receptor, &protein_pdbqt, true).await?;
        self.prepare(&config.ligand, &ligand_pdbqt, false).await?;
        tokio::fs::write(&config_file, config.vina_config(&protein_pdbqt, &ligand_pdbqt)).await?;

        let output = Command::new(&self.executable_path)
            .arg("--config")
            .arg(&config_file)
            .arg("--out")
            .arg(&docked_poses)
            .arg("--log")
            .arg(&log_file)
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("Failed to start {}", self.executable_path.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("AutoDock Vina failed: {}", stderr.trim());
        }

        // Vina 1.2 dropped --log; the table is on stdout then.
        let log = match tokio::fs::read_to_string(&log_file).await {
            Ok(text) => text,
            Err(_) => String::from_utf8_lossy(&output.stdout).to_string(),
        };
        let binding_modes = parse_vina_log(&log);
        debug!(modes = binding_modes.len(), "AutoDock Vina completed. Output in {:?}", docked_poses);

        Ok(DockingOutput {
            protein_pdbqt,
            ligand_pdbqt,
            config_file,
            docked_poses,
            log_file,
            binding_modes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const LOG: &str = "\
Detected 4 CPUs
mode |   affinity | dist from best mode
     | (kcal/mol) | rmsd l.b.| rmsd u.b.
-----+------------+----------+----------
   1         -7.2      0.000      0.000
   2         -6.9      2.163      3.384
   3         -6.5      1.901      7.022
Writing output ... done.
";

    fn config() -> DockingConfig {
        DockingConfig {
            receptor: PathBuf::from("/data/receptor.pdb"),
            ligand: PathBuf::from("/data/ligand.sdf"),
            center_x: 1.5,
            center_y: -2.0,
            center_z: 0.0,
            size_x: 20.0,
            size_y: 20.0,
            size_z: 20.0,
            exhaustiveness: 16,
            num_modes: 10,
            energy_range: 3,
            cpu: 4,
            seed: None,
        }
    }

    #[test]
    fn test_parse_vina_log() {
        let modes = parse_vina_log(LOG);
        assert_eq!(modes.len(), 3);
        assert_eq!(modes[0], BindingMode { mode: 1, affinity: -7.2, rmsd_lb: 0.0, rmsd_ub: 0.0 });
        assert_eq!(modes[2].rmsd_ub, 7.022);
        assert!(parse_vina_log("no table").is_empty());
    }

    #[test]
    fn test_vina_config_contents() {
        let text = config().vina_config(Path::new("r.pdbqt"), Path::new("l.pdbqt"));
        assert!(text.contains("receptor = r.pdbqt"));
        assert!(text.contains("center_x = 1.5"));
        assert!(text.contains("center_y = -2"));
        assert!(text.contains("exhaustiveness = 16"));
        assert!(text.contains("cpu = 4"));
        assert!(!text.contains("seed"));
    }

    #[tokio::test]
    async fn test_missing_receptor() {
        let dir = tempdir().unwrap();
        let err = VinaRunner::new("vina", "obabel").run(&config(), dir.path()).await.unwrap_err();
        assert!(err.to_string().contains("Input file not found"));
    }
}
