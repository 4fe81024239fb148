use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use clap::{Args, Parser, Subcommand, ValueEnum, ValueHint};
use engine::{
    Attachment, ChapterEdition, Command, Event, FieldValue, FileSnapshot, MkvToolnixBackend,
    OutputMode, PatchField, ResolvedChangeset, Session, Track, ToolBackend,
    format_timestamp_millis, generate_chapters, parse_chapters,
};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "trackpatch",
    version,
    about = "Queue Matroska track and chapter edits and apply them with MKVToolNix"
)]
struct Cli {
    /// Directory holding mkvmerge, mkvpropedit and mkvextract.
    #[arg(
        long,
        global = true,
        env = "TRACKPATCH_MKVTOOLNIX_DIR",
        value_name = "DIR",
        value_hint = ValueHint::DirPath
    )]
    mkvtoolnix_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Debug, Subcommand)]
enum CliCommand {
    /// Show the tracks, attachments and chapter count of a file.
    Identify(IdentifyCommand),
    /// Run an edit script and print the tool invocation it would produce.
    Plan(ScriptCommand),
    /// Run an edit script and apply the result.
    Apply(ScriptCommand),
    /// Validate a chapter XML file and print it normalized.
    Chapters(ChaptersCommand),
    /// Copy a track, an attachment or the chapters out of a file.
    Extract(ExtractCommand),
}

#[derive(Debug, Args)]
struct IdentifyCommand {
    #[arg(value_name = "FILE", value_hint = ValueHint::FilePath)]
    file: PathBuf,
    /// Print the snapshot as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
struct ScriptCommand {
    #[arg(value_name = "FILE", value_hint = ValueHint::FilePath)]
    file: PathBuf,
    /// JSON array of edit commands.
    #[arg(long, value_name = "EDITS", value_hint = ValueHint::FilePath)]
    script: PathBuf,
    /// How a remux replaces the file.
    #[arg(long, value_enum, default_value_t = ModeArg::Backup)]
    mode: ModeArg,
    /// Write a remux to this path instead of replacing the file.
    #[arg(long, value_name = "PATH", value_hint = ValueHint::FilePath, conflicts_with = "mode")]
    output: Option<PathBuf>,
}

impl ScriptCommand {
    fn output_mode(&self) -> OutputMode {
        match (&self.output, self.mode) {
            (Some(path), _) => OutputMode::SaveAs(path.clone()),
            (None, ModeArg::Backup) => OutputMode::Backup,
            (None, ModeArg::Inline) => OutputMode::Inline,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq, Default)]
enum ModeArg {
    /// Keep the previous file as `<file>.bak`.
    #[default]
    Backup,
    /// Replace the file without a backup.
    Inline,
}

#[derive(Debug, Args)]
struct ChaptersCommand {
    #[arg(value_name = "XML", value_hint = ValueHint::FilePath)]
    file: PathBuf,
    /// Print an outline with timestamps instead of the XML.
    #[arg(long)]
    outline: bool,
}

#[derive(Debug, Args)]
struct ExtractCommand {
    #[command(subcommand)]
    target: ExtractTarget,
}

#[derive(Debug, Subcommand)]
enum ExtractTarget {
    /// Write the raw stream of one track.
    Track(ExtractItem),
    /// Write one attachment.
    Attachment(ExtractItem),
    /// Write the chapters as XML.
    Chapters(ExtractChapters),
}

#[derive(Debug, Args)]
struct ExtractItem {
    #[arg(value_name = "FILE", value_hint = ValueHint::FilePath)]
    file: PathBuf,
    /// Track or attachment id as shown by `identify`.
    #[arg(value_name = "ID")]
    id: u32,
    /// Destination; defaults to a name derived from the item, beside FILE.
    #[arg(short, long, value_name = "PATH", value_hint = ValueHint::FilePath)]
    output: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct ExtractChapters {
    #[arg(value_name = "FILE", value_hint = ValueHint::FilePath)]
    file: PathBuf,
    /// Destination; the XML goes to stdout when omitted.
    #[arg(short, long, value_name = "PATH", value_hint = ValueHint::FilePath)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    run(cli)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("trackpatch=info,engine=info,mkvtoolnix=info,warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run(cli: Cli) -> Result<()> {
    let backend = MkvToolnixBackend::new(cli.mkvtoolnix_dir);
    match cli.command {
        CliCommand::Identify(cmd) => handle_identify(backend, cmd)?,
        CliCommand::Plan(cmd) => handle_plan(backend, cmd)?,
        CliCommand::Apply(cmd) => handle_apply(backend, cmd)?,
        CliCommand::Chapters(cmd) => handle_chapters(cmd)?,
        CliCommand::Extract(cmd) => handle_extract(backend, cmd)?,
    }

    Ok(())
}

fn handle_identify(backend: MkvToolnixBackend, cmd: IdentifyCommand) -> Result<()> {
    let session = open_session(backend, &cmd.file)?;
    let file = session
        .file()
        .ok_or_else(|| anyhow!("{} is not open", cmd.file.display()))?;
    if cmd.json {
        println!("{}", serde_json::to_string_pretty(file)?);
    } else {
        print!("{}", describe_file(file));
    }
    Ok(())
}

fn handle_plan(backend: MkvToolnixBackend, cmd: ScriptCommand) -> Result<()> {
    let session = run_script(backend, &cmd)?;
    let summary = session.summary();
    for (index, pending) in summary.pending.iter().enumerate() {
        println!("{:>3}. {pending}", index + 1);
    }
    if let Some(file) = session.file() {
        print!("{}", describe_layout(&session.resolved()?, &file.tracks));
    }

    match session.preview_apply(&cmd.output_mode())? {
        Some(plan) => println!("{}", plan.command_line()),
        None => println!("no changes to apply"),
    }
    Ok(())
}

fn handle_apply(backend: MkvToolnixBackend, cmd: ScriptCommand) -> Result<()> {
    let mut session = run_script(backend, &cmd)?;
    let events = session
        .handle_command(Command::Apply {
            mode: cmd.output_mode(),
        })
        .with_context(|| format!("failed to apply edits to {}", cmd.file.display()))?;

    if events.is_empty() {
        println!("no changes to apply");
        return Ok(());
    }
    for event in events {
        if let Event::Applied {
            tool,
            path,
            warnings,
        } = event
        {
            for warning in &warnings {
                eprintln!("warning: {warning}");
            }
            println!("{} wrote {}", tool.program_name(), path.display());
        }
    }
    Ok(())
}

fn handle_chapters(cmd: ChaptersCommand) -> Result<()> {
    let xml = fs::read_to_string(&cmd.file)
        .with_context(|| format!("failed to read {}", cmd.file.display()))?;
    let editions = parse_chapters(&xml)
        .with_context(|| format!("invalid chapters in {}", cmd.file.display()))?;
    if cmd.outline {
        print!("{}", outline(&editions));
    } else {
        print!("{}", generate_chapters(&editions));
    }
    Ok(())
}

fn handle_extract(backend: MkvToolnixBackend, cmd: ExtractCommand) -> Result<()> {
    match cmd.target {
        ExtractTarget::Track(item) => {
            let snapshot = backend
                .identify(&item.file)
                .with_context(|| format!("failed to open {}", item.file.display()))?;
            let track = snapshot
                .track(item.id)
                .ok_or_else(|| anyhow!("{} has no track {}", item.file.display(), item.id))?;
            let output = item
                .output
                .unwrap_or_else(|| track_output_path(&item.file, track));
            backend
                .extract_track(&item.file, item.id, &output)
                .with_context(|| format!("failed to extract track {}", item.id))?;
            println!("track {} written to {}", item.id, output.display());
        }
        ExtractTarget::Attachment(item) => {
            let snapshot = backend
                .identify(&item.file)
                .with_context(|| format!("failed to open {}", item.file.display()))?;
            let attachment = snapshot
                .attachments
                .iter()
                .find(|attachment| attachment.id == item.id)
                .ok_or_else(|| anyhow!("{} has no attachment {}", item.file.display(), item.id))?;
            let output = item
                .output
                .unwrap_or_else(|| attachment_output_path(&item.file, attachment));
            backend
                .extract_attachment(&item.file, item.id, &output)
                .with_context(|| format!("failed to extract attachment {}", item.id))?;
            println!("attachment {} written to {}", item.id, output.display());
        }
        ExtractTarget::Chapters(target) => {
            let mut session = open_session(backend, &target.file)?;
            let events = session
                .handle_command(Command::LoadChapters)
                .with_context(|| format!("failed to read chapters of {}", target.file.display()))?;
            let editions = events
                .into_iter()
                .find_map(|event| match event {
                    Event::ChaptersLoaded(editions) => Some(editions),
                    _ => None,
                })
                .unwrap_or_default();
            if editions.is_empty() {
                bail!("{} has no chapters", target.file.display());
            }
            let xml = generate_chapters(&editions);
            match target.output {
                Some(output) => {
                    fs::write(&output, xml)
                        .with_context(|| format!("failed to write {}", output.display()))?;
                    println!("chapters written to {}", output.display());
                }
                None => print!("{xml}"),
            }
        }
    }
    Ok(())
}

/// `<stem>_track<id><ext>` beside `file`.
fn track_output_path(file: &Path, track: &Track) -> PathBuf {
    sibling_dir(file).join(track.suggested_file_name(file))
}

/// The attachment's own file name beside `file`, stripped of any directories.
fn attachment_output_path(file: &Path, attachment: &Attachment) -> PathBuf {
    let name = attachment
        .file_name
        .as_deref()
        .and_then(|name| Path::new(name).file_name())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(format!("attachment{}", attachment.id)));
    sibling_dir(file).join(name)
}

fn sibling_dir(file: &Path) -> &Path {
    match file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

fn open_session(backend: MkvToolnixBackend, file: &Path) -> Result<Session<MkvToolnixBackend>> {
    let mut session = Session::new(backend);
    session
        .handle_command(Command::Open {
            path: file.to_path_buf(),
        })
        .with_context(|| format!("failed to open {}", file.display()))?;
    Ok(session)
}

fn run_script(
    backend: MkvToolnixBackend,
    cmd: &ScriptCommand,
) -> Result<Session<MkvToolnixBackend>> {
    let commands = load_script(&cmd.script)?;
    let mut session = open_session(backend, &cmd.file)?;
    for (index, command) in commands.into_iter().enumerate() {
        debug!(step = index + 1, ?command, "running script step");
        session
            .handle_command(command)
            .with_context(|| format!("script step {} failed", index + 1))?;
    }
    info!(
        pending = session.log().operation_count(),
        "edit script finished"
    );
    Ok(session)
}

/// Reads an edit script, rejecting steps the command line already covers.
fn load_script(path: &Path) -> Result<Vec<Command>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read script {}", path.display()))?;
    let commands: Vec<Command> = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse script {}", path.display()))?;
    for (index, command) in commands.iter().enumerate() {
        match command {
            Command::Open { .. } | Command::Reload => {
                bail!("script step {}: the file is given on the command line", index + 1)
            }
            Command::Apply { .. } => {
                bail!("script step {}: use the apply subcommand instead", index + 1)
            }
            _ => {}
        }
    }
    Ok(commands)
}

fn describe_file(file: &FileSnapshot) -> String {
    let mut out = format!("{}\n", file.path.display());
    if let Some(title) = &file.title {
        out.push_str(&format!("title: {title}\n"));
    }
    for track in &file.tracks {
        let mut line = format!(
            "  track {}: {} ({}) [{}]",
            track.id,
            track.track_type.label(),
            track.codec,
            track.language.as_deref().unwrap_or("und")
        );
        if let Some((width, height)) = track.pixel_size {
            line.push_str(&format!(" {width}x{height}"));
        }
        if let Some(name) = &track.name {
            line.push_str(&format!(" \"{name}\""));
        }
        let flags = [
            ("default", track.flags.default_track),
            ("forced", track.flags.forced_track),
            ("original", track.flags.original),
            ("visual-impaired", track.flags.visual_impaired),
            ("commentary", track.flags.commentary),
        ];
        for (label, value) in flags {
            if value == Some(true) {
                line.push(' ');
                line.push_str(label);
            }
        }
        if track.flags.enabled_track == Some(false) {
            line.push_str(" disabled");
        }
        out.push_str(&line);
        out.push('\n');
    }
    for attachment in &file.attachments {
        out.push_str(&format!(
            "  attachment {}: {} ({})\n",
            attachment.id,
            attachment.file_name.as_deref().unwrap_or("unnamed"),
            attachment.content_type.as_deref().unwrap_or("unknown type")
        ));
    }
    out.push_str(&format!("chapters: {}\n", file.chapter_count));
    out
}

/// Surviving tracks in output order with the fields an apply would change.
fn describe_layout(changes: &ResolvedChangeset, tracks: &[Track]) -> String {
    let mut out = String::from("after apply:\n");
    for track in changes.effective_tracks(tracks) {
        out.push_str(&format!("  track {}: {}\n", track.id, track.display_name()));
        for field in PatchField::ALL {
            if changes.is_property_modified(track.id, field) {
                let value = changes.effective_value(track, field);
                out.push_str(&format!("    {}: {}\n", field.label(), render_value(&value)));
            }
        }
    }
    for added in &changes.added_tracks {
        out.push_str(&format!("  added: {}\n", added.addition.path.display()));
    }
    out
}

fn render_value(value: &FieldValue) -> String {
    match value {
        FieldValue::Text(text) if text.is_empty() => "(cleared)".to_string(),
        FieldValue::Text(text) => text.clone(),
        FieldValue::Flag(true) => "yes".to_string(),
        FieldValue::Flag(false) => "no".to_string(),
        FieldValue::Pixels(pixels) => format!("{pixels}px"),
    }
}

fn outline(editions: &[ChapterEdition]) -> String {
    let mut out = String::new();
    for (index, edition) in editions.iter().enumerate() {
        out.push_str(&format!("edition {}", index + 1));
        if edition.is_default {
            out.push_str(" (default)");
        }
        out.push('\n');
        for chapter in &edition.chapters {
            let title = chapter
                .displays
                .first()
                .map(|display| display.text.as_str())
                .unwrap_or("");
            out.push_str(&format!(
                "  {} {title}\n",
                format_timestamp_millis(chapter.time_start)
            ));
        }
    }
    out
}
