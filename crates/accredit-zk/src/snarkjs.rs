//! PLONK backend driving the circom/snarkjs command-line toolchain.
//!
//! Layout under `circuit_dir` for circuit `name` and ptau power `p`:
//!
//! | artifact                    | produced by                               |
//! |-----------------------------|-------------------------------------------|
//! | `name.r1cs`, `name_js/`     | `circom name.circom --r1cs --wasm --sym`  |
//! | `potP_0000/0001/final.ptau` | `snarkjs powersoftau new/contribute/prepare phase2` |
//! | `name_final.zkey`           | `snarkjs plonk setup`                     |
//! | `verification_key.json`     | `snarkjs zkey export verificationkey`     |
//!
//! Each preparation step is skipped when its artifact already exists. Every
//! prove and verify call works in its own scratch directory under
//! `circuit_dir/runs`, removed when the call returns.

use rand::RngCore;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, Mutex};

use crate::backend::{EligibilityBackend, ProofBundle, VerificationKeySource};
use crate::error::{ZkError, ZkResult};
use crate::inputs::CircuitInputs;

// ---------------------------------------------------------------------------
// Command execution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit status; `-1` when the process was killed by a signal.
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

pub trait CommandRunner: Send + Sync {
    /// Run `program` to completion. A program that cannot be found is
    /// [`ZkError::ToolchainUnavailable`]; a nonzero exit is not an error here.
    fn run(&self, program: &str, args: &[String]) -> ZkResult<CommandOutput>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[String]) -> ZkResult<CommandOutput> {
        tracing::debug!(program, ?args, "running toolchain command");
        let output = Command::new(program).args(args).output().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ZkError::ToolchainUnavailable(program.to_string())
            } else {
                ZkError::Io(e)
            }
        })?;
        Ok(CommandOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SnarkjsConfig {
    pub circuit_dir: PathBuf,
    pub circuit_name: String,
    pub ptau_power: u32,
    pub circom_bin: String,
    pub snarkjs_bin: String,
    pub node_bin: String,
}

impl Default for SnarkjsConfig {
    fn default() -> Self {
        Self {
            circuit_dir: PathBuf::from("zk"),
            circuit_name: "eligibility".to_string(),
            ptau_power: 12,
            circom_bin: "circom".to_string(),
            snarkjs_bin: "snarkjs".to_string(),
            node_bin: "node".to_string(),
        }
    }
}

impl SnarkjsConfig {
    fn artifact(&self, file: &str) -> PathBuf {
        self.circuit_dir.join(file)
    }

    pub fn circuit_source(&self) -> PathBuf {
        self.artifact(&format!("{}.circom", self.circuit_name))
    }

    pub fn r1cs(&self) -> PathBuf {
        self.artifact(&format!("{}.r1cs", self.circuit_name))
    }

    pub fn wasm(&self) -> PathBuf {
        self.witness_dir().join(format!("{}.wasm", self.circuit_name))
    }

    pub fn witness_generator(&self) -> PathBuf {
        self.witness_dir().join("generate_witness.js")
    }

    fn witness_dir(&self) -> PathBuf {
        self.artifact(&format!("{}_js", self.circuit_name))
    }

    pub fn ptau(&self, stage: &str) -> PathBuf {
        self.artifact(&format!("pot{}_{}.ptau", self.ptau_power, stage))
    }

    pub fn zkey(&self) -> PathBuf {
        self.artifact(&format!("{}_final.zkey", self.circuit_name))
    }

    pub fn verification_key(&self) -> PathBuf {
        self.artifact("verification_key.json")
    }

    fn runs_dir(&self) -> PathBuf {
        self.artifact("runs")
    }
}

fn arg(path: &Path) -> String {
    path.display().to_string()
}

/// Scratch directory for one prove or verify call.
struct RunDir(PathBuf);

impl RunDir {
    fn create(parent: &Path, kind: &str) -> ZkResult<Self> {
        let path = parent.join(format!("{}-{}", kind, uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&path)?;
        Ok(Self(path))
    }

    fn file(&self, name: &str) -> PathBuf {
        self.0.join(name)
    }
}

impl Drop for RunDir {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.0) {
            tracing::warn!(path = %self.0.display(), error = %e, "failed to remove scratch directory");
        }
    }
}

// ---------------------------------------------------------------------------
// SnarkjsBackend
// ---------------------------------------------------------------------------

pub struct SnarkjsBackend {
    config: SnarkjsConfig,
    runner: Arc<dyn CommandRunner>,
    verification_key: Arc<dyn VerificationKeySource>,
    prepared: Mutex<bool>,
}

impl SnarkjsBackend {
    pub fn new(
        config: SnarkjsConfig,
        runner: Arc<dyn CommandRunner>,
        verification_key: Arc<dyn VerificationKeySource>,
    ) -> Self {
        Self {
            config,
            runner,
            verification_key,
            prepared: Mutex::new(false),
        }
    }

    /// Backend using the system toolchain and the key exported into `circuit_dir`.
    pub fn system(config: SnarkjsConfig) -> Self {
        let key = crate::backend::FileVerificationKey::new(config.verification_key());
        Self::new(config, Arc::new(SystemRunner), Arc::new(key))
    }

    pub fn config(&self) -> &SnarkjsConfig {
        &self.config
    }

    fn step(&self, step: &str, program: &str, args: Vec<String>) -> ZkResult<()> {
        let output = self.runner.run(program, &args)?;
        if !output.success() {
            tracing::error!(step, status = output.status, stderr = %output.stderr, "toolchain step failed");
            return Err(ZkError::ToolchainFailed {
                step: step.to_string(),
                status: output.status,
                stderr: output.stderr,
            });
        }
        tracing::debug!(step, "toolchain step complete");
        Ok(())
    }

    fn snarkjs(&self, step: &str, args: &[&str]) -> ZkResult<()> {
        self.step(
            step,
            &self.config.snarkjs_bin,
            args.iter().map(|a| a.to_string()).collect(),
        )
    }

    fn run_prepare(&self) -> ZkResult<()> {
        let c = &self.config;

        if !c.r1cs().exists() {
            tracing::info!(circuit = %c.circuit_name, "compiling circuit");
            self.step(
                "compile",
                &c.circom_bin,
                vec![
                    arg(&c.circuit_source()),
                    "--r1cs".into(),
                    "--wasm".into(),
                    "--sym".into(),
                    "--output".into(),
                    arg(&c.circuit_dir),
                ],
            )?;
        }

        let ptau_final = c.ptau("final");
        if !ptau_final.exists() {
            tracing::info!(power = c.ptau_power, "running powers-of-tau ceremony");
            let (p0, p1) = (arg(&c.ptau("0000")), arg(&c.ptau("0001")));
            let power = c.ptau_power.to_string();
            self.snarkjs("ptau-new", &["powersoftau", "new", "bn128", &power, &p0, "-v"])?;

            let mut entropy = [0u8; 32];
            rand::rngs::OsRng.fill_bytes(&mut entropy);
            let entropy = format!("-e={}", hex::encode(entropy));
            self.snarkjs(
                "ptau-contribute",
                &["powersoftau", "contribute", &p0, &p1, "--name=First", "-v", &entropy],
            )?;
            self.snarkjs(
                "ptau-prepare",
                &["powersoftau", "prepare", "phase2", &p1, &arg(&ptau_final), "-v"],
            )?;
        }

        if !c.zkey().exists() {
            tracing::info!("running plonk setup");
            self.snarkjs(
                "plonk-setup",
                &["plonk", "setup", &arg(&c.r1cs()), &arg(&ptau_final), &arg(&c.zkey())],
            )?;
        }

        if !c.verification_key().exists() {
            self.snarkjs(
                "export-vkey",
                &[
                    "zkey",
                    "export",
                    "verificationkey",
                    &arg(&c.zkey()),
                    &arg(&c.verification_key()),
                ],
            )?;
        }
        Ok(())
    }
}

impl EligibilityBackend for SnarkjsBackend {
    fn name(&self) -> &'static str {
        "plonk-snarkjs"
    }

    fn prepare(&self) -> ZkResult<()> {
        let mut prepared = self
            .prepared
            .lock()
            .map_err(|e| ZkError::WorkerFailed(format!("prepare lock poisoned: {e}")))?;
        if *prepared {
            return Ok(());
        }
        self.run_prepare()?;
        *prepared = true;
        tracing::info!(dir = %self.config.circuit_dir.display(), "eligibility circuit ready");
        Ok(())
    }

    fn prove(&self, inputs: &CircuitInputs) -> ZkResult<ProofBundle> {
        self.prepare()?;
        let c = &self.config;
        let run = RunDir::create(&c.runs_dir(), "prove")?;
        let (input, witness) = (run.file("input.json"), run.file("witness.wtns"));
        let (proof, public) = (run.file("proof.json"), run.file("public.json"));

        std::fs::write(&input, inputs.to_json()?)?;
        self.step(
            "witness",
            &c.node_bin,
            vec![
                arg(&c.witness_generator()),
                arg(&c.wasm()),
                arg(&input),
                arg(&witness),
            ],
        )?;
        self.snarkjs(
            "plonk-prove",
            &["plonk", "prove", &arg(&c.zkey()), &arg(&witness), &arg(&proof), &arg(&public)],
        )?;

        let proof_bytes = std::fs::read(&proof)?;
        let public_signals: Vec<String> = serde_json::from_slice(&std::fs::read(&public)?)?;
        tracing::info!(signals = public_signals.len(), "eligibility proof generated");
        Ok(ProofBundle {
            proof: proof_bytes,
            public_signals,
        })
    }

    fn verify(&self, bundle: &ProofBundle) -> ZkResult<bool> {
        if bundle.proof.is_empty() || bundle.public_signals.is_empty() {
            return Ok(false);
        }
        let key = self.verification_key.load_verification_key()?;
        let run = RunDir::create(&self.config.runs_dir(), "verify")?;
        let (vk, public, proof) = (
            run.file("verification_key.json"),
            run.file("public.json"),
            run.file("proof.json"),
        );
        std::fs::write(&vk, key)?;
        std::fs::write(&public, serde_json::to_vec(&bundle.public_signals)?)?;
        std::fs::write(&proof, &bundle.proof)?;

        let output = self.runner.run(
            &self.config.snarkjs_bin,
            &[
                "plonk".to_string(),
                "verify".to_string(),
                arg(&vk),
                arg(&public),
                arg(&proof),
            ],
        )?;
        if !output.success() {
            tracing::debug!(status = output.status, "plonk verify rejected proof");
        }
        Ok(output.success())
    }
}
