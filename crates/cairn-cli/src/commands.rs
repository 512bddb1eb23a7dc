use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use cairn_crypto::ContentHasher;
use cairn_pack::{PackReader, UnpackedObject};
use cairn_store::{BuildOptions, FsSnapshot, GitObject, LooseObjectStore, ObjectStore, Tree, TreeBuilder};
use cairn_types::{ObjectId, ObjectKind};
use colored::Colorize;
use memmap2::Mmap;
use serde_json::json;

use crate::cli::*;
use crate::config::CairnConfig;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let repo = Repo::new(cli.git_dir, cli.format);
    match cli.command {
        Command::Init(args) => cmd_init(&repo, args),
        Command::HashObject(args) => cmd_hash_object(&repo, args),
        Command::CatFile(args) => cmd_cat_file(&repo, args),
        Command::LsTree(args) => cmd_ls_tree(&repo, args),
        Command::WriteTree(args) => cmd_write_tree(&repo, args),
        Command::UnpackObjects(args) => cmd_unpack_objects(&repo, args),
        Command::VerifyPack(args) => cmd_verify_pack(&repo, args),
    }
}

/// Global options shared by every command.
struct Repo {
    git_dir: PathBuf,
    format: OutputFormat,
}

impl Repo {
    fn new(git_dir: PathBuf, format: OutputFormat) -> Self {
        Self { git_dir, format }
    }

    fn config(&self) -> anyhow::Result<CairnConfig> {
        CairnConfig::load(&self.git_dir)
    }

    fn store(&self, config: &CairnConfig) -> LooseObjectStore {
        LooseObjectStore::new(config.store_config(&self.git_dir))
    }

    fn json(&self) -> bool {
        self.format == OutputFormat::Json
    }
}

fn parse_id(text: &str) -> anyhow::Result<ObjectId> {
    ObjectId::from_hex(text).with_context(|| format!("not a valid object id: {text}"))
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn cmd_init(repo: &Repo, args: InitArgs) -> anyhow::Result<()> {
    let git_dir = match args.path {
        Some(root) => root.join(".git"),
        None => repo.git_dir.clone(),
    };
    for dir in ["objects", "refs/heads", "refs/tags"] {
        fs::create_dir_all(git_dir.join(dir))
            .with_context(|| format!("failed to create {}", git_dir.join(dir).display()))?;
    }
    let head = git_dir.join("HEAD");
    if !head.exists() {
        fs::write(&head, "ref: refs/heads/main\n")
            .with_context(|| format!("failed to write {}", head.display()))?;
    }

    if repo.json() {
        return print_json(&json!({ "git_dir": git_dir }));
    }
    println!(
        "{} Initialized empty repository in {}",
        "✓".green().bold(),
        git_dir.display().to_string().bold()
    );
    Ok(())
}

fn cmd_hash_object(repo: &Repo, args: HashObjectArgs) -> anyhow::Result<()> {
    let content =
        fs::read(&args.file).with_context(|| format!("failed to read {}", args.file.display()))?;
    let id = if args.write {
        let config = repo.config()?;
        repo.store(&config).write(&GitObject::blob(content))?
    } else {
        ContentHasher::BLOB.hash(&content)
    };

    if repo.json() {
        return print_json(&json!({ "id": id, "written": args.write }));
    }
    println!("{id}");
    Ok(())
}

fn cmd_cat_file(repo: &Repo, args: CatFileArgs) -> anyhow::Result<()> {
    let id = parse_id(&args.object)?;
    let config = repo.config()?;
    let object = repo.store(&config).read(&id)?;

    if repo.json() {
        let mut value = json!({ "id": id, "kind": object.kind, "size": object.size() });
        if args.pretty {
            value["content"] = match object.kind {
                ObjectKind::Tree => serde_json::to_value(tree_rows(&Tree::from_object(&object)?))?,
                _ => String::from_utf8_lossy(&object.payload).into_owned().into(),
            };
        }
        return print_json(&value);
    }

    if args.kind {
        println!("{}", object.kind);
    } else if args.size {
        println!("{}", object.size());
    } else if object.kind == ObjectKind::Tree {
        print_tree(&Tree::from_object(&object)?, false);
    } else {
        let mut stdout = io::stdout().lock();
        stdout.write_all(&object.payload)?;
        stdout.flush()?;
    }
    Ok(())
}

#[derive(serde::Serialize)]
struct TreeRow {
    mode: String,
    kind: ObjectKind,
    id: ObjectId,
    name: String,
}

fn tree_rows(tree: &Tree) -> Vec<TreeRow> {
    tree.entries
        .iter()
        .map(|entry| TreeRow {
            mode: entry.mode.to_string(),
            kind: entry.mode.target_kind(),
            id: entry.target,
            name: entry.name_lossy().into_owned(),
        })
        .collect()
}

fn print_tree(tree: &Tree, name_only: bool) {
    for row in tree_rows(tree) {
        if name_only {
            println!("{}", row.name);
        } else {
            println!("{} {} {}\t{}", row.mode, row.kind, row.id, row.name);
        }
    }
}

fn cmd_ls_tree(repo: &Repo, args: LsTreeArgs) -> anyhow::Result<()> {
    let id = parse_id(&args.tree)?;
    let config = repo.config()?;
    let object = repo.store(&config).read(&id)?;
    if object.kind != ObjectKind::Tree {
        bail!("{id} is a {}, not a tree", object.kind);
    }
    let tree = Tree::from_object(&object)?;

    if repo.json() {
        return print_json(&tree_rows(&tree));
    }
    print_tree(&tree, args.name_only);
    Ok(())
}

/// Working directory for a git dir: its parent, or `.` for a bare `.git`.
fn work_dir_of(git_dir: &Path) -> PathBuf {
    match git_dir.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Tree options for `dir`, with the git dir excluded whatever the config's
/// ignore list says.
fn tree_options(repo: &Repo, config: &CairnConfig, dir: &Path) -> BuildOptions {
    let mut options = config.tree.clone();
    let inside = match (repo.git_dir.canonicalize(), dir.canonicalize()) {
        (Ok(git_dir), Ok(dir)) => git_dir.starts_with(dir),
        _ => false,
    };
    if let (true, Some(name)) = (inside, repo.git_dir.file_name()) {
        let name = name.to_string_lossy().into_owned();
        if !options.ignore.contains(&name) {
            options.ignore.push(name);
        }
    }
    options
}

fn write_tree(repo: &Repo, dir: &Path) -> anyhow::Result<ObjectId> {
    let config = repo.config()?;
    let store = repo.store(&config);
    let root = TreeBuilder::with_options(&store, tree_options(repo, &config, dir))
        .build(&FsSnapshot::new(dir))
        .with_context(|| format!("failed to write tree for {}", dir.display()))?;
    Ok(root)
}

fn cmd_write_tree(repo: &Repo, args: WriteTreeArgs) -> anyhow::Result<()> {
    let dir = args.dir.unwrap_or_else(|| work_dir_of(&repo.git_dir));
    let root = write_tree(repo, &dir)?;

    if repo.json() {
        return print_json(&json!({ "tree": root }));
    }
    println!("{root}");
    Ok(())
}

fn map_pack(path: &Path) -> anyhow::Result<Mmap> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    // SAFETY: read-only mapping; pack files are not rewritten in place.
    let map = unsafe { Mmap::map(&file) }
        .with_context(|| format!("failed to map {}", path.display()))?;
    Ok(map)
}

fn cmd_unpack_objects(repo: &Repo, args: PackArgs) -> anyhow::Result<()> {
    let pack = map_pack(&args.pack)?;
    let config = repo.config()?;
    let store = repo.store(&config);
    let records = PackReader::with_config(&store, config.pack.clone())
        .unpack(&pack)
        .with_context(|| format!("failed to unpack {}", args.pack.display()))?;

    if repo.json() {
        return print_json(&records);
    }
    for record in &records {
        println!("{}", record.id);
    }
    eprintln!(
        "{} Unpacked {} objects",
        "✓".green().bold(),
        records.len()
    );
    Ok(())
}

fn cmd_verify_pack(repo: &Repo, args: PackArgs) -> anyhow::Result<()> {
    let pack = map_pack(&args.pack)?;
    let config = repo.config()?;
    let store = repo.store(&config);
    let records = PackReader::with_config(&store, config.pack.clone())
        .inspect(&pack)
        .with_context(|| format!("{} is not a valid pack", args.pack.display()))?;

    if repo.json() {
        return print_json(&records);
    }
    for record in &records {
        println!("{}", verify_line(record));
    }
    println!(
        "{}: {} {} objects",
        args.pack.display(),
        "ok".green().bold(),
        records.len()
    );
    Ok(())
}

/// `id kind size packed-size offset [depth]`, as `git verify-pack -v` prints.
fn verify_line(record: &UnpackedObject) -> String {
    let mut line = format!(
        "{} {:<6} {} {} {}",
        record.id, record.kind, record.size, record.packed_size, record.offset
    );
    if record.depth > 0 {
        line.push_str(&format!(" {}", record.depth));
    }
    line
}
