use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand, ValueEnum};
use envelope_tool::{
    Base32, CrockfordBase32, EncryptionParams, EnvelopeFields, HashAlgorithm,
    config::{self, Config},
    crockford, crypto, file_ops, rfc4648, word_safe,
};
use std::{env, path::PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "envelope_tool",
    version,
    about = "パスワードで保護されたBase32エンベロープの作成と復号"
)]
struct Cli {
    /// 設定ファイルのパス
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// 詳細出力
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 文字列を暗号化してエンベロープを出力
    Encrypt {
        /// 暗号化するテキスト
        text: String,
        #[command(flatten)]
        password: PasswordArgs,
        #[command(flatten)]
        params: ParamArgs,
    },
    /// エンベロープを復号化
    Decrypt {
        /// エンベロープ文字列
        envelope: String,
        #[command(flatten)]
        password: PasswordArgs,
        /// 旧形式（区切り文字 L、アルゴリズムタグなし）として復号化する
        #[arg(long, value_name = "ALGORITHM")]
        legacy: Option<HashAlgorithm>,
    },
    /// ファイルを暗号化
    EncryptFile {
        input: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[command(flatten)]
        password: PasswordArgs,
        #[command(flatten)]
        params: ParamArgs,
    },
    /// ファイルを復号化
    DecryptFile {
        input: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[command(flatten)]
        password: PasswordArgs,
    },
    /// エンベロープのフィールドを表示（復号はしない）
    Inspect { envelope: String },
    /// Base32エンコード
    Encode {
        text: String,
        #[arg(short, long, value_enum, default_value_t = AlphabetChoice::Crockford)]
        alphabet: AlphabetChoice,
    },
    /// Base32デコード
    Decode {
        text: String,
        #[arg(short, long, value_enum, default_value_t = AlphabetChoice::Crockford)]
        alphabet: AlphabetChoice,
        /// Crockfordの寛容なデコード（小文字、I/L/O、ハイフン）
        #[arg(long)]
        lenient: bool,
    },
    /// 設定ファイルの管理
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// デフォルト設定ファイルを作成
    Init {
        /// 既存のファイルを上書きする
        #[arg(long)]
        force: bool,
    },
    /// 現在の設定を表示
    Show,
    /// 設定ファイルのパスを表示
    Path,
    /// 設定ファイルを削除
    Delete,
}

#[derive(clap::Args)]
struct PasswordArgs {
    /// パスワード（省略時は環境変数から読み取る）
    #[arg(short, long)]
    password: Option<String>,
    /// パスワードを読み取る環境変数名
    #[arg(long)]
    password_env: Option<String>,
}

#[derive(clap::Args)]
struct ParamArgs {
    /// ソルト長（バイト）
    #[arg(long)]
    salt_length: Option<usize>,
    /// PBKDF2の反復回数
    #[arg(long)]
    iterations: Option<u32>,
    /// PBKDF2のハッシュアルゴリズム
    #[arg(long)]
    algorithm: Option<HashAlgorithm>,
}

#[derive(Clone, Copy, ValueEnum)]
enum AlphabetChoice {
    Rfc4648,
    Crockford,
    WordSafe,
}

impl AlphabetChoice {
    fn codec(self, lenient: bool) -> Result<&'static dyn Base32> {
        match (self, lenient) {
            (AlphabetChoice::Crockford, true) => Ok(&CrockfordBase32),
            (_, true) => Err(anyhow!("--lenient はCrockfordアルファベットでのみ使用できます")),
            (AlphabetChoice::Rfc4648, false) => Ok(rfc4648()),
            (AlphabetChoice::Crockford, false) => Ok(crockford()),
            (AlphabetChoice::WordSafe, false) => Ok(word_safe()),
        }
    }
}

impl PasswordArgs {
    fn resolve(&self, config: &Config) -> Result<String> {
        if let Some(password) = &self.password {
            return Ok(password.clone());
        }

        let var = self
            .password_env
            .as_ref()
            .or(config.default_password_env.as_ref())
            .ok_or_else(|| anyhow!("パスワードが指定されていません（--password または環境変数）"))?;

        env::var(var).with_context(|| format!("環境変数 {var} からパスワードを取得できません"))
    }
}

impl ParamArgs {
    fn apply(&self, defaults: &EncryptionParams) -> EncryptionParams {
        EncryptionParams {
            salt_length: self.salt_length.unwrap_or(defaults.salt_length),
            iterations: self.iterations.unwrap_or(defaults.iterations),
            hash_algorithm: self.algorithm.unwrap_or(defaults.hash_algorithm),
        }
    }
}

fn init_logging(verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!(e))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => config::get_default_config_path()?,
    };

    // 設定ファイル自体を扱うコマンドは、壊れた設定でも実行できるよう読み込み前に処理する
    match cli.command {
        Commands::Config(ConfigCommands::Init { force }) => {
            init_logging(cli.verbose)?;
            return init_config_file(&config_path, force);
        }
        Commands::Config(ConfigCommands::Path) => {
            println!("{}", config_path.display());
            return Ok(());
        }
        Commands::Config(ConfigCommands::Delete) => {
            init_logging(cli.verbose)?;
            config::delete_config_file(&config_path)?;
            println!("設定ファイルを削除しました: {}", config_path.display());
            return Ok(());
        }
        command => {
            let config = config::load_config(Some(&config_path))?;
            init_logging(cli.verbose || config.default_verbose)?;
            run_command(command, &config)
        }
    }
}

fn run_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Encrypt {
            text,
            password,
            params,
        } => {
            let password = password.resolve(config)?;
            let params = params.apply(&config.encryption);
            let envelope = crypto::encrypt_with_params(text.as_bytes(), &password, &params)
                .context("暗号化に失敗しました")?;
            println!("{envelope}");
        }
        Commands::Decrypt {
            envelope,
            password,
            legacy,
        } => {
            let password = password.resolve(config)?;
            let envelope = envelope.trim();
            let plaintext = match legacy {
                Some(algorithm) => crypto::decrypt_legacy_bytes(envelope, &password, algorithm),
                None => crypto::decrypt_bytes(envelope, &password),
            }
            .context("復号化に失敗しました")?;
            let text = String::from_utf8(plaintext).context("UTF-8変換に失敗しました")?;
            println!("{text}");
        }
        Commands::EncryptFile {
            input,
            output,
            password,
            params,
        } => {
            let password = password.resolve(config)?;
            let params = params.apply(&config.encryption);
            let output = file_ops::determine_output_path(&input, &output, true)?;
            file_ops::encrypt_file(&input, &output, &password, &params)?;
            println!("暗号化完了: {}", output.display());
        }
        Commands::DecryptFile {
            input,
            output,
            password,
        } => {
            let password = password.resolve(config)?;
            let output = file_ops::determine_output_path(&input, &output, false)?;
            file_ops::decrypt_file(&input, &output, &password)?;
            println!("復号化完了: {}", output.display());
        }
        Commands::Inspect { envelope } => {
            let fields: EnvelopeFields = envelope
                .trim()
                .parse()
                .context("エンベロープの解析に失敗しました")?;
            println!(
                "ソルト: {} ({} バイト)",
                crockford().encode(&fields.salt),
                fields.salt.len()
            );
            println!("反復回数: {}", fields.iterations);
            println!(
                "アルゴリズム: {} (タグ {})",
                fields.hash_algorithm,
                fields.hash_algorithm.tag()
            );
            println!("暗号文: {} バイト", fields.ciphertext.len());
        }
        Commands::Encode { text, alphabet } => {
            println!("{}", alphabet.codec(false)?.encode(text.as_bytes()));
        }
        Commands::Decode {
            text,
            alphabet,
            lenient,
        } => {
            let bytes = alphabet
                .codec(lenient)?
                .decode(&text)
                .context("Base32デコードに失敗しました")?;
            println!("{}", String::from_utf8_lossy(&bytes));
        }
        // init / path / delete は main で処理済み
        Commands::Config(_) => {
            let content =
                toml::to_string_pretty(config).context("設定の表示に失敗しました")?;
            print!("{content}");
        }
    }

    Ok(())
}

fn init_config_file(path: &std::path::Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(anyhow!(
            "設定ファイルは既に存在します: {}（--force で上書き）",
            path.display()
        ));
    }
    config::create_config_file(path)?;
    println!("設定ファイルを作成しました: {}", path.display());
    Ok(())
}
