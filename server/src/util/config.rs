use log::LevelFilter;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

const BIND_ADDR_VAR: &str = "VAULT_BIND_ADDRESS";
const LOG_LEVEL_VAR: &str = "VAULT_LOG_LEVEL";
const JWT_SECRET_VAR: &str = "VAULT_JWT_SECRET";
const JWT_TTL_SECS_VAR: &str = "VAULT_JWT_TTL_SECS";
const BLOB_ROOT_VAR: &str = "VAULT_BLOB_ROOT";
const PSQL_DSN_VAR: &str = "VAULT_PSQL_DSN";
const PSQL_CERT_PEM_VAR: &str = "VAULT_PSQL_CRT_PEM";

/// The structure of the TOML config file. Every setting here may be overridden by the
/// correspondingly named environment variable, which always wins over the file.
#[derive(Deserialize, Default)]
struct TomlConfig {
	server: Option<ServerSection>,
	auth: Option<AuthSection>,
	postgresql: Option<PostgresSection>,
	log: Option<LogSection>,
}

#[derive(Deserialize, Default)]
struct ServerSection {
	bind_address: Option<SocketAddr>,
	blob_root: Option<PathBuf>,
	delete_worker_count: Option<usize>,
}

#[derive(Deserialize, Default)]
struct AuthSection {
	jwt_secret: Option<String>,
	jwt_ttl_secs: Option<u64>,
}

#[derive(Deserialize, Default)]
struct PostgresSection {
	dsn: Option<String>,
	tls_crt_pem: Option<PathBuf>,
}

#[derive(Deserialize, Default)]
struct LogSection {
	level: Option<String>,
}

/// Fully resolved server configuration: the merge of the TOML file (if any) and environment
/// variable overrides.
pub(crate) struct Config {
	pub(crate) bind_address: SocketAddr,
	pub(crate) jwt_secret: String,
	pub(crate) jwt_ttl: Duration,
	pub(crate) blob_root: PathBuf,
	pub(crate) delete_worker_count: usize,
	/// `None` runs against the in-memory store; `Some` connects to Postgres at this DSN.
	pub(crate) postgres_dsn: Option<String>,
	pub(crate) postgres_tls_crt_pem: Option<PathBuf>,
	pub(crate) log_level: LevelFilter,
}

#[inline]
fn read_env(var: &str) -> Result<Option<String>, String> {
	match std::env::var(var) {
		Ok(val) => Ok(Some(val)),
		Err(std::env::VarError::NotPresent) => Ok(None),
		Err(e) => Err(format!("failed to read {var}: {e}")),
	}
}

/// Loads configuration from an optional TOML file, then applies environment variable
/// overrides. `config_file_path` is optional so the server can run with nothing but
/// environment variables set.
pub(crate) fn load_config(config_file_path: Option<&str>) -> Result<Config, String> {
	let TomlConfig { server, auth, postgresql, log } = match config_file_path {
		Some(path) => {
			let contents = std::fs::read_to_string(path)
				.map_err(|e| format!("failed to read config file {path}: {e}"))?;
			toml::from_str(&contents).map_err(|e| format!("failed to parse config file: {e}"))?
		},
		None => TomlConfig::default(),
	};
	let server = server.unwrap_or_default();
	let auth = auth.unwrap_or_default();
	let postgresql = postgresql.unwrap_or_default();
	let log = log.unwrap_or_default();

	let bind_address = read_env(BIND_ADDR_VAR)?
		.map(|addr| addr.parse::<SocketAddr>().map_err(|e| format!("invalid {BIND_ADDR_VAR}: {e}")))
		.transpose()?
		.or(server.bind_address)
		.ok_or_else(|| format!("server bind address must be set via config or {BIND_ADDR_VAR}"))?;

	let jwt_secret = read_env(JWT_SECRET_VAR)?
		.or(auth.jwt_secret)
		.ok_or_else(|| format!("JWT signing secret must be set via config or {JWT_SECRET_VAR}"))?;

	let jwt_ttl_secs = read_env(JWT_TTL_SECS_VAR)?
		.map(|v| v.parse::<u64>().map_err(|e| format!("invalid {JWT_TTL_SECS_VAR}: {e}")))
		.transpose()?
		.or(auth.jwt_ttl_secs)
		.unwrap_or(3600 * 24);

	let blob_root = read_env(BLOB_ROOT_VAR)?
		.map(PathBuf::from)
		.or(server.blob_root)
		.unwrap_or_else(|| PathBuf::from("vault-blobs"));

	let postgres_dsn = read_env(PSQL_DSN_VAR)?.or(postgresql.dsn);
	let postgres_tls_crt_pem =
		read_env(PSQL_CERT_PEM_VAR)?.map(PathBuf::from).or(postgresql.tls_crt_pem);

	let log_level_str = read_env(LOG_LEVEL_VAR)?.or(log.level);
	let log_level = log_level_str
		.map(|s| s.parse::<LevelFilter>().map_err(|e| format!("invalid {LOG_LEVEL_VAR}: {e}")))
		.transpose()?
		.unwrap_or(LevelFilter::Info);

	Ok(Config {
		bind_address,
		jwt_secret,
		jwt_ttl: Duration::from_secs(jwt_ttl_secs),
		blob_root,
		delete_worker_count: server.delete_worker_count.unwrap_or(4),
		postgres_dsn,
		postgres_tls_crt_pem,
		log_level,
	})
}
