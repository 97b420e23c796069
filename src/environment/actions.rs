//! Provisioning operations for a real environment.
//!
//! Container work goes through the environment's [`ContainerRuntime`]; the
//! `ckan` image mount points (`/usr/lib/ckan`, `/project`, `/var/www/storage`)
//! are fixed by the images.
use super::ckan_ini::{self, APP_SECTION};
use super::store::{self, SiteEntry};
use super::Environment;
use crate::docker::{PortBinding, RunSpec};
use crate::install::{self, InstallOptions};
use crate::provision::Provision;
use crate::templates;
use crate::util::{create_dir_all, create_private_dir_all};
use anyhow::{anyhow, Context, Result};
use std::collections::BTreeSet;
use std::fs;
use std::thread;
use std::time::{Duration, Instant};

const PASTER: &str = "/usr/lib/ckan/bin/paster";
const WEB_CONTAINER_PORT: u16 = 5000;

impl Environment {
    fn chown_project(&self) -> Result<()> {
        self.runtime
            .run(&self.project_spec().command([
                "/bin/chown",
                "-R",
                "--reference=/project",
                "/usr/lib/ckan",
                "/project",
            ]))
            .map(|_| ())
    }

    fn plugins(&self, skin: bool) -> String {
        let mut plugins = vec!["datastore", "resource_proxy", "text_view"];
        if self.paths.srcdir().join("datapusher").is_dir() {
            plugins.push("datapusher");
        }
        plugins.extend(["recline_grid_view", "recline_graph_view"]);
        let mut rendered = plugins.join(" ");
        if skin {
            rendered.push_str(&format!(" {}_theme", self.name));
        }
        rendered
    }

    fn skin_dir_name(&self) -> String {
        format!("ckanext-{}theme", self.name)
    }
}

impl Provision for Environment {
    fn name(&self) -> &str {
        &self.name
    }

    fn child_name(&self) -> &str {
        &self.child_name
    }

    fn children(&self) -> &BTreeSet<String> {
        &self.children
    }

    fn data_exists(&self) -> bool {
        self.paths.datadir().is_dir()
    }

    fn create_directories(&self, create_project_dir: bool) -> Result<()> {
        // The data directory already exists when adding a child.
        if !self.paths.datadir().is_dir() {
            create_private_dir_all(self.paths.datadir())?;
        }
        let sitedir = self.paths.sitedir();
        if sitedir.is_dir() {
            return Err(anyhow!("Site already exists."));
        }
        create_private_dir_all(&sitedir)?;
        for dir in [
            self.paths.venv_dir(),
            self.paths.postgres_dir(),
            self.paths.solr_dir(),
            self.paths.files_dir(),
            self.paths.run_dir(),
        ] {
            create_dir_all(&dir)?;
        }
        if create_project_dir {
            create_dir_all(self.paths.srcdir())?;
        }
        Ok(())
    }

    fn create_bash_profile(&self) -> Result<()> {
        let path = self.paths.bash_profile_path();
        let profile = templates::bash_profile(&self.name, &self.child_name);
        fs::write(&path, profile.as_bytes()).with_context(|| format!("write {}", path.display()))
    }

    fn create_virtualenv(&self) -> Result<()> {
        let copied = self.runtime.run(
            &self
                .preload_spec()
                .rw(self.paths.venv_dir(), "/usr/lib/ckan_target")
                .command(["/bin/cp", "-a", "/usr/lib/ckan/.", "/usr/lib/ckan_target/."]),
        );
        // Ownership is fixed even when the copy fails part way.
        let owned = self.runtime.run(
            &self
                .web_spec()
                .rw(self.paths.venv_dir(), "/usr/lib/ckan")
                .ro(self.paths.srcdir(), "/project")
                .command(["/bin/chown", "-R", "--reference=/project", "/usr/lib/ckan"]),
        );
        copied?;
        owned?;
        Ok(())
    }

    fn save(&self) -> Result<()> {
        store::save_environment(&self.paths, &self.name, &self.ckan_version)
    }

    fn create_source(&self) -> Result<()> {
        let srcdir = self.paths.srcdir();
        let copied = if srcdir.join("ckan").is_dir() {
            Ok(())
        } else {
            self.runtime
                .run(
                    &self
                        .preload_spec()
                        .rw(srcdir, "/project_target")
                        .command(["/bin/cp", "-a", "/project/ckan", "/project_target/ckan"]),
                )
                .and_then(|_| {
                    let config_dir = srcdir.join("ckan").join("ckan").join("config");
                    for (from, to) in [
                        (config_dir.join("who.ini"), srcdir.join("who.ini")),
                        (
                            config_dir.join("solr").join("schema.xml"),
                            self.paths.schema_xml_path(),
                        ),
                    ] {
                        fs::copy(&from, &to).with_context(|| {
                            format!("copy {} to {}", from.display(), to.display())
                        })?;
                    }
                    Ok(())
                })
        };
        let owned = self.runtime.run(
            &self
                .web_spec()
                .rw(srcdir, "/project")
                .command(["/bin/chown", "-R", "--reference=/project", "/project"]),
        );
        copied?;
        owned?;
        Ok(())
    }

    fn create_ckan_ini(&self) -> Result<()> {
        if self.paths.ckan_ini_path().is_file() {
            return Ok(());
        }
        self.runtime
            .run(&self.project_spec().command([
                PASTER,
                "make-config",
                "ckan",
                "/project/development.ini",
            ]))
            .map(|_| ())
    }

    fn save_child(&self) -> Result<()> {
        store::save_site(
            &self.paths,
            &self.child_name,
            SiteEntry {
                port: Some(self.port),
                address: Some(self.address.clone()),
            },
        )?;
        store::write_passwords(&self.paths.passwords_path(), self.passwords())
    }

    fn start_postgres_and_solr(&self) -> Result<()> {
        let postgres = self.container_name("postgres");
        let solr = self.container_name("solr");
        if self.runtime.is_running(&postgres)? && self.runtime.is_running(&solr)? {
            return Ok(());
        }
        self.stop_postgres_and_solr()?;
        // The postgres entrypoint creates its users from these passwords the
        // first time it sees an empty data directory.
        self.runtime.run(
            &RunSpec::new(self.settings.images.postgres.as_str())
                .named(postgres)
                .envs(&self.passwords)
                .rw(self.paths.postgres_dir(), "/var/lib/postgresql/data")
                .detached(),
        )?;
        self.runtime.run(
            &RunSpec::new(self.settings.images.solr.as_str())
                .named(solr)
                .rw(self.paths.solr_dir(), "/var/lib/solr")
                .ro(self.paths.schema_xml_path(), "/etc/solr/conf/schema.xml")
                .detached(),
        )?;
        Ok(())
    }

    fn fix_storage_permissions(&self) -> Result<()> {
        self.runtime
            .run(
                &self
                    .web_spec()
                    .rw(self.paths.files_dir(), "/var/www/storage")
                    .command(["/bin/chown", "-R", "www-data:", "/var/www/storage"]),
            )
            .map(|_| ())
    }

    fn update_ckan_ini(&self, skin: bool) -> Result<()> {
        // Credentials stay out of the source tree; containers receive them as
        // CKAN_* environment variables instead.
        let options: Vec<(String, String)> = [
            ("sqlalchemy.url", "postgresql://<hidden>".to_string()),
            ("ckan.datastore.read_url", "postgresql://<hidden>".to_string()),
            ("ckan.datastore.write_url", "postgresql://<hidden>".to_string()),
            ("ckan.datapusher.url", "http://datapusher:8800".to_string()),
            ("solr_url", "http://solr:8080/solr".to_string()),
            ("ckan.storage_path", "/var/www/storage".to_string()),
            ("ckan.plugins", self.plugins(skin)),
            ("ckan.site_title", self.name.clone()),
            ("ckan.site_logo", String::new()),
            ("ckan.auth.create_user_via_web", "false".to_string()),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect();
        ckan_ini::update_file(&self.paths.ckan_ini_path(), APP_SECTION, &options)
    }

    fn fix_project_permissions(&self) -> Result<()> {
        self.chown_project()
    }

    fn create_install_template_skin(&self) -> Result<()> {
        let skin_dir = self.skin_dir_name();
        if self.paths.srcdir().join(&skin_dir).is_dir() {
            return Ok(());
        }
        self.runtime.run(&self.project_spec().command([
            PASTER,
            "--plugin=ckan",
            "create",
            "-t",
            "ckanext",
            skin_dir.as_str(),
            "-o",
            "/project",
            "--no-interactive",
        ]))?;
        self.chown_project()
    }

    fn ckan_db_init(&self) -> Result<()> {
        let spec = self.db_spec().command([
            PASTER,
            "--plugin=ckan",
            "db",
            "init",
            "-c",
            "/project/development.ini",
        ]);
        let window = Duration::from_secs(self.settings.db_init_retry_seconds);
        let delay = Duration::from_millis(self.settings.db_init_retry_delay_ms);
        let started = Instant::now();
        let mut attempt = 1u32;
        loop {
            match self.runtime.run(&spec) {
                Ok(_) => return Ok(()),
                Err(err) if started.elapsed() + delay < window => {
                    tracing::warn!(attempt, error = %err, "database not ready; retrying db init");
                    thread::sleep(delay);
                    attempt += 1;
                }
                Err(err) => {
                    return Err(err.context(format!(
                        "Failed to initialize the database after {attempt} attempt(s)"
                    )))
                }
            }
        }
    }

    fn install_dependencies(&self, options: &InstallOptions) -> Result<()> {
        install::install(self, options)
    }

    fn start_web(&self, address: &str) -> Result<()> {
        let web = self.container_name("web");
        self.runtime.remove(&web)?;
        self.runtime.run(
            &self
                .web_spec()
                .named(web)
                .envs(&self.ckan_env())
                .rw(self.paths.venv_dir(), "/usr/lib/ckan")
                .rw(self.paths.srcdir(), "/project")
                .rw(self.paths.files_dir(), "/var/www/storage")
                .link(self.container_name("postgres"), "db")
                .link(self.container_name("solr"), "solr")
                .port(PortBinding {
                    host_address: address.to_string(),
                    host_port: self.port,
                    container_port: WEB_CONTAINER_PORT,
                })
                .detached(),
        )?;
        Ok(())
    }

    fn web_address(&self) -> String {
        format!("http://{}:{}/", self.address, self.port)
    }

    fn stop_postgres_and_solr(&self) -> Result<()> {
        self.runtime.remove(&self.container_name("postgres"))?;
        self.runtime.remove(&self.container_name("solr"))
    }

    fn create_admin_set_password(&self, password: &str) -> Result<()> {
        let input = self.paths.admin_input_path();
        let script = self.paths.run_dir().join("update_add_admin.py");
        let admin = serde_json::json!({
            "name": "admin",
            "email": "none",
            "password": password,
            "sysadmin": true,
        });
        let text = serde_json::to_string_pretty(&admin).context("serialize admin account")?;
        fs::write(&input, text.as_bytes())
            .with_context(|| format!("write {}", input.display()))?;
        let result = fs::write(&script, templates::UPDATE_ADD_ADMIN_PY.as_bytes())
            .with_context(|| format!("write {}", script.display()))
            .and_then(|_| {
                self.runtime.run(
                    &self
                        .db_spec()
                        .ro(&input, "/input/admin.json")
                        .ro(&script, "/scripts/update_add_admin.py")
                        .command([
                            "/usr/lib/ckan/bin/python",
                            "/scripts/update_add_admin.py",
                        ]),
                )
            });
        // The password file never outlives the command.
        let removed = fs::remove_file(&input).with_context(|| format!("remove {}", input.display()));
        let _ = fs::remove_file(&script);
        result?;
        removed
    }
}
