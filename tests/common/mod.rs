//! Shared test infrastructure for integration tests.
//!
//! Each sandbox has its own datacats home, a working directory for source
//! trees, and a fake container CLI that records its arguments and succeeds.
#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

const FAKE_DOCKER: &str = r#"#!/bin/sh
echo "$*" >> "$FAKE_DOCKER_LOG"
if [ "$1" = "inspect" ]; then
    echo false
fi

# Host side of the volume mounted at container path $1.
mount_for() {
    target="$1"
    shift
    prev=""
    for arg in "$@"; do
        if [ "$prev" = "-v" ]; then
            case "$arg" in
                *:"$target":*) echo "${arg%%:$target:*}"; return ;;
            esac
        fi
        prev="$arg"
    done
}

if [ -n "$FAKE_DOCKER_SEED" ]; then
    case " $* " in
        *" /project/ckan /project_target/ckan "*)
            dest=$(mount_for /project_target "$@")
            mkdir -p "$dest/ckan/ckan/config/solr"
            touch "$dest/ckan/setup.py" "$dest/ckan/ckan/config/who.ini" \
                "$dest/ckan/ckan/config/solr/schema.xml"
            ;;
        *" make-config ckan /project/development.ini "*)
            dest=$(mount_for /project "$@")
            printf '[app:main]\n' > "$dest/development.ini"
            ;;
    esac
fi
exit 0
"#;

pub struct Sandbox {
    root: TempDir,
    seed_source: bool,
}

impl Sandbox {
    pub fn new() -> Self {
        let root = tempfile::tempdir().expect("create sandbox");
        fs::create_dir_all(root.path().join("home")).expect("create home");
        fs::create_dir_all(root.path().join("work")).expect("create work");
        let script = root.path().join("fake-docker");
        fs::write(&script, FAKE_DOCKER).expect("write fake docker");
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755))
            .expect("make fake docker executable");
        Self {
            root,
            seed_source: false,
        }
    }

    /// A sandbox whose fake CLI also lays down the files the CKAN image
    /// would produce, so a whole create can complete.
    pub fn seeding() -> Self {
        Self {
            seed_source: true,
            ..Self::new()
        }
    }

    pub fn home(&self) -> PathBuf {
        self.root.path().join("home")
    }

    pub fn work(&self) -> PathBuf {
        self.root.path().join("work")
    }

    fn docker_log_path(&self) -> PathBuf {
        self.root.path().join("docker.log")
    }

    /// Argument lines the fake container CLI has received so far.
    pub fn docker_calls(&self) -> Vec<String> {
        match fs::read_to_string(self.docker_log_path()) {
            Ok(text) => text.lines().map(str::to_string).collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Run the datacats binary from the sandbox working directory.
    pub fn datacats(&self, args: &[&str]) -> Output {
        self.datacats_in(&self.work(), args)
    }

    pub fn datacats_in(&self, dir: &Path, args: &[&str]) -> Output {
        let mut command = Command::new(env!("CARGO_BIN_EXE_datacats"));
        if self.seed_source {
            command.env("FAKE_DOCKER_SEED", "1");
        } else {
            command.env_remove("FAKE_DOCKER_SEED");
        }
        command
            .args(args)
            .current_dir(dir)
            .env("DATACATS_HOME", self.home())
            .env("DATACATS_DOCKER", self.root.path().join("fake-docker"))
            .env("FAKE_DOCKER_LOG", self.docker_log_path())
            .env_remove("DATACATS_LOG")
            .stdin(Stdio::null())
            .output()
            .expect("run datacats")
    }
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}
