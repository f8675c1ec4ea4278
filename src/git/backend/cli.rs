use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{GitError, Result};
use crate::git::backend::{
    Backend, CommitData, CommitFileStatus, CommitSignature, Divergence, LogFilter, ObjectKind, RawTreeEntry,
    RevListQuery,
};
use crate::git::object_id::ObjectId;
use crate::git::signature::Signature;
use crate::git::tag::{TAG_PREFIX, Tag, for_each_ref_format, parse_ref_records, parse_tag_ref};
use crate::git::tree_entry::EntryMode;
use crate::process::{CmdArg, Command, Context, RunOpts};
use crate::settings::Settings;

/// Runs the `git` executable for every query.
#[derive(Debug)]
pub struct CliBackend {
    path: PathBuf,
    settings: Arc<Settings>,
}

impl CliBackend {
    pub fn new(path: impl Into<PathBuf>, settings: Arc<Settings>) -> Self {
        CliBackend {
            path: path.into(),
            settings,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn git<I, A>(&self, ctx: &Context, args: I) -> Command
    where
        I: IntoIterator<Item = A>,
        A: Into<CmdArg>,
    {
        Command::new(ctx, &self.settings, args)
    }

    fn output(&self, cmd: Command) -> Result<Vec<u8>> {
        let (stdout, _) = cmd.run_std_bytes(RunOpts::in_dir(&self.path))?;
        Ok(stdout)
    }

    fn output_string(&self, cmd: Command) -> Result<String> {
        let (stdout, _) = cmd.run_std_string(RunOpts::in_dir(&self.path))?;
        Ok(stdout)
    }

    fn cat_file(&self, ctx: &Context, kind: &'static str, id: &ObjectId) -> Result<Vec<u8>> {
        let cmd = self.git(ctx, ["cat-file", kind]).add_dynamic_arguments([id.to_hex()]);
        self.output(cmd).map_err(|e| missing_object(e, id))
    }
}

/// Maps git's "no such object" and "bad revision" failures to `NotFound`.
fn missing_object(err: GitError, what: impl ToString) -> GitError {
    const MARKERS: [&str; 6] = [
        "unknown revision or path",
        "Needed a single revision",
        "bad revision",
        "Not a valid object name",
        "not a valid object",
        "bad file",
    ];
    match err.stderr() {
        Some(stderr) if MARKERS.iter().any(|m| stderr.contains(m)) => GitError::not_found(what.to_string()),
        _ => err,
    }
}

fn no_merge_base(err: GitError) -> GitError {
    match err.stderr() {
        Some(stderr) if stderr.contains("no merge base") => GitError::NoMergeBase,
        _ => err,
    }
}

fn parse_ids(output: &str) -> Result<Vec<ObjectId>> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ObjectId::from_hex)
        .collect()
}

/// Parses `cat-file commit` output.
pub fn parse_commit(id: ObjectId, raw: &[u8]) -> Result<CommitData> {
    let text = String::from_utf8_lossy(raw);
    let (headers, message) = text.split_once("\n\n").unwrap_or((text.as_ref(), ""));

    let mut tree_id = None;
    let mut parents = Vec::new();
    let mut author = None;
    let mut committer = None;
    let mut gpgsig: Option<String> = None;
    let mut payload_headers = Vec::new();
    let mut in_sig = false;

    for line in headers.lines() {
        if let Some(cont) = line.strip_prefix(' ') {
            if in_sig {
                if let Some(sig) = gpgsig.as_mut() {
                    sig.push('\n');
                    sig.push_str(cont);
                }
            } else {
                payload_headers.push(line);
            }
            continue;
        }
        in_sig = false;
        let (key, value) = line.split_once(' ').unwrap_or((line, ""));
        match key {
            "tree" => tree_id = Some(ObjectId::from_hex(value)?),
            "parent" => parents.push(ObjectId::from_hex(value)?),
            "author" => author = Some(Signature::parse(value)?),
            "committer" => committer = Some(Signature::parse(value)?),
            "gpgsig" | "gpgsig-sha256" => {
                gpgsig = Some(value.to_string());
                in_sig = true;
                continue;
            }
            _ => {}
        }
        payload_headers.push(line);
    }

    let missing = |field: &str| GitError::Parse(format!("commit {id}: missing {field}"));
    let signature = gpgsig.map(|mut signature| {
        signature.push('\n');
        CommitSignature {
            signature,
            payload: format!("{}\n\n{message}", payload_headers.join("\n")),
        }
    });
    Ok(CommitData {
        id,
        tree_id: tree_id.ok_or_else(|| missing("tree"))?,
        parents,
        author: author.ok_or_else(|| missing("author"))?,
        committer: committer.ok_or_else(|| missing("committer"))?,
        message: message.to_string(),
        signature,
    })
}

/// Parses `cat-file tag` output.
pub fn parse_tag_object(id: ObjectId, raw: &[u8]) -> Result<Tag> {
    let text = String::from_utf8_lossy(raw);
    let (headers, message) = text.split_once("\n\n").unwrap_or((text.as_ref(), ""));
    let mut object = None;
    let mut name = String::new();
    let mut tagger = None;
    for line in headers.lines() {
        let (key, value) = line.split_once(' ').unwrap_or((line, ""));
        match key {
            "object" => object = Some(ObjectId::from_hex(value)?),
            "tag" => name = value.to_string(),
            "tagger" => tagger = Some(Signature::parse(value)?),
            _ => {}
        }
    }
    let object = object.ok_or_else(|| GitError::Parse(format!("tag {id}: missing object")))?;
    Ok(Tag::annotated(name, id, object, tagger, message))
}

/// Parses `ls-tree -z -l` records: `<mode> <type> <id> <size>\t<name>`.
pub fn parse_ls_tree(raw: &[u8]) -> Result<Vec<RawTreeEntry>> {
    raw.split(|b| *b == 0)
        .filter(|record| !record.is_empty())
        .map(|record| -> Result<RawTreeEntry> {
            let record = String::from_utf8_lossy(record);
            let (meta, name) = record
                .split_once('\t')
                .ok_or_else(|| GitError::Parse(format!("bad ls-tree record {record:?}")))?;
            let mut fields = meta.split_whitespace();
            let (Some(mode), Some(_kind), Some(id), size) =
                (fields.next(), fields.next(), fields.next(), fields.next())
            else {
                return Err(GitError::Parse(format!("bad ls-tree record {record:?}")));
            };
            Ok(RawTreeEntry {
                name: name.to_string(),
                mode: EntryMode::from_octal(mode)?,
                id: ObjectId::from_hex(id)?,
                size: size.and_then(|s| s.parse().ok()),
            })
        })
        .collect()
}

/// Parses `log --name-status -z` output: status and path records separated
/// by NUL. Statuses other than added, deleted and modified are skipped.
pub fn parse_name_status(raw: &[u8]) -> CommitFileStatus {
    let mut status = CommitFileStatus::default();
    let mut fields = raw
        .split(|b| *b == 0)
        .map(|field| String::from_utf8_lossy(field).trim_start_matches('\n').to_string())
        .filter(|field| !field.is_empty());
    while let (Some(code), Some(path)) = (fields.next(), fields.next()) {
        match code.as_bytes().first() {
            Some(b'A') => status.added.push(path),
            Some(b'D') => status.removed.push(path),
            Some(b'M') => status.modified.push(path),
            _ => {}
        }
    }
    status.sort();
    status
}

/// `git describe` and `git name-rev` failures that only mean "no name".
fn no_name(err: &GitError) -> bool {
    const MARKERS: [&str; 3] = ["no tag exactly matches", "cannot describe", "No names found"];
    err.stderr().is_some_and(|stderr| MARKERS.iter().any(|m| stderr.contains(m)))
}

/// Pathspecs starting with `:` are magic; escape them to match literally.
fn literal_path(path: &str) -> String {
    if path.is_empty() {
        ".".to_string()
    } else if path.starts_with(':') {
        format!("\\{path}")
    } else {
        path.to_string()
    }
}

impl Backend for CliBackend {
    fn name(&self) -> &'static str {
        "cli"
    }

    fn resolve(&self, ctx: &Context, rev: &str) -> Result<ObjectId> {
        let cmd = self.git(ctx, ["rev-parse", "--verify"]).add_dynamic_arguments([rev]);
        let out = self.output_string(cmd).map_err(|e| missing_object(e, rev))?;
        ObjectId::from_hex(out.trim())
    }

    fn object_kind(&self, ctx: &Context, id: &ObjectId) -> Result<ObjectKind> {
        String::from_utf8_lossy(&self.cat_file(ctx, "-t", id)?).parse()
    }

    fn object_size(&self, ctx: &Context, id: &ObjectId) -> Result<u64> {
        let out = self.cat_file(ctx, "-s", id)?;
        String::from_utf8_lossy(&out)
            .trim()
            .parse()
            .map_err(|_| GitError::Parse(format!("bad object size for {id}")))
    }

    fn read_commit(&self, ctx: &Context, id: &ObjectId) -> Result<CommitData> {
        parse_commit(*id, &self.cat_file(ctx, "commit", id)?)
    }

    fn read_tag(&self, ctx: &Context, id: &ObjectId) -> Result<Tag> {
        parse_tag_object(*id, &self.cat_file(ctx, "tag", id)?)
    }

    fn read_tree(&self, ctx: &Context, id: &ObjectId) -> Result<Vec<RawTreeEntry>> {
        let cmd = self.git(ctx, ["ls-tree", "-z", "-l"]).add_dynamic_arguments([id.to_hex()]);
        parse_ls_tree(&self.output(cmd).map_err(|e| missing_object(e, id))?)
    }

    fn read_blob(&self, ctx: &Context, id: &ObjectId) -> Result<Vec<u8>> {
        self.cat_file(ctx, "blob", id)
    }

    fn last_commit_for_path(&self, ctx: &Context, start: &ObjectId, path: &str) -> Result<ObjectId> {
        let cmd = self
            .git(ctx, ["log", "-1", "--pretty=format:%H"])
            .add_dynamic_arguments([start.to_hex()])
            .add_dashes_and_list([literal_path(path)]);
        let out = self.output_string(cmd).map_err(|e| missing_object(e, start))?;
        parse_ids(&out)?
            .into_iter()
            .next()
            .ok_or_else(|| GitError::path_not_found(path))
    }

    fn rev_list(&self, ctx: &Context, query: &RevListQuery) -> Result<Vec<ObjectId>> {
        let out = self.output_string(rev_list_command(self.git(ctx, ["rev-list"]), query))
            .map_err(no_merge_base)?;
        parse_ids(&out)
    }

    fn count(&self, ctx: &Context, query: &RevListQuery) -> Result<u64> {
        let cmd = rev_list_command(self.git(ctx, ["rev-list", "--count"]), query);
        let out = self.output_string(cmd).map_err(no_merge_base)?;
        out.trim()
            .parse()
            .map_err(|_| GitError::Parse(format!("bad rev-list count {:?}", out.trim())))
    }

    fn log(&self, ctx: &Context, filter: &LogFilter) -> Result<Vec<ObjectId>> {
        let mut cmd = self
            .git(ctx, ["log", "--pretty=format:%H", "-i"])
            .add_arguments([CmdArg::trusted(format!("--max-count={}", filter.max_count))])
            .add_option_values("--author", filter.authors.iter().cloned())
            .add_option_values("--committer", filter.committers.iter().cloned())
            .add_option_values("--after", filter.after.iter().cloned())
            .add_option_values("--before", filter.before.iter().cloned())
            .add_option_values("--grep", filter.grep.iter().cloned());
        if filter.all {
            cmd = cmd.add_arguments(["--all"]);
        }
        if !filter.revision.is_empty() {
            cmd = cmd.add_dynamic_arguments([filter.revision.clone()]);
        }
        let out = self
            .output_string(cmd.add_dashes_and_list(Vec::<String>::new()))
            .map_err(|e| missing_object(e, &filter.revision))?;
        parse_ids(&out)
    }

    fn changed_files(&self, ctx: &Context, base: &str, head: &str, from_merge_base: bool) -> Result<Vec<String>> {
        let revs = if from_merge_base {
            vec![format!("{base}...{head}")]
        } else {
            vec![base.to_string(), head.to_string()]
        };
        let cmd = self
            .git(ctx, ["diff", "--name-only", "-z"])
            .add_dynamic_arguments(revs)
            .add_dashes_and_list(Vec::<String>::new());
        let out = self.output(cmd).map_err(no_merge_base)?;
        let mut files: Vec<String> = out
            .split(|b| *b == 0)
            .filter(|name| !name.is_empty())
            .map(|name| String::from_utf8_lossy(name).into_owned())
            .collect();
        files.sort();
        Ok(files)
    }

    fn is_ancestor(&self, ctx: &Context, ancestor: &ObjectId, descendant: &ObjectId) -> Result<bool> {
        let cmd = self
            .git(ctx, ["merge-base", "--is-ancestor"])
            .add_dynamic_arguments([ancestor.to_hex(), descendant.to_hex()]);
        match self.output(cmd) {
            Ok(_) => Ok(true),
            Err(e) if e.is_exit_code(1) && e.stderr().is_none_or(str::is_empty) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn references(&self, ctx: &Context, prefix: &str) -> Result<Vec<(String, ObjectId)>> {
        let cmd = self
            .git(ctx, ["for-each-ref", "--format=%(objectname) %(refname)"])
            .add_dynamic_arguments([prefix]);
        let out = self.output_string(cmd)?;
        let mut refs = Vec::new();
        for line in out.lines().filter(|l| !l.is_empty()) {
            let (id, name) = line
                .split_once(' ')
                .ok_or_else(|| GitError::Parse(format!("bad for-each-ref line {line:?}")))?;
            refs.push((name.to_string(), ObjectId::from_hex(id)?));
        }
        refs.sort();
        Ok(refs)
    }

    fn head_ref(&self, ctx: &Context) -> Result<Option<String>> {
        match self.output_string(self.git(ctx, ["symbolic-ref", "-q", "HEAD"])) {
            Ok(out) => Ok(Some(out.trim().to_string()).filter(|s| !s.is_empty())),
            Err(e) if e.is_exit_code(1) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn tags(&self, ctx: &Context) -> Result<Vec<Tag>> {
        let cmd = self
            .git(ctx, ["for-each-ref", "--sort", "-creatordate"])
            .add_arguments([CmdArg::trusted(for_each_ref_format()), CmdArg::from(TAG_PREFIX)]);
        let out = self.output(cmd)?;
        let mut tags = parse_ref_records(&out)
            .iter()
            .map(parse_tag_ref)
            .collect::<Result<Vec<_>>>()?;
        tags.sort_by_key(|t| std::cmp::Reverse(t.tagger.as_ref().map(Signature::timestamp)));
        Ok(tags)
    }

    fn commit_file_status(&self, ctx: &Context, id: &ObjectId) -> Result<CommitFileStatus> {
        let cmd = self
            .git(
                ctx,
                ["log", "--name-status", "--pretty=format:", "--no-renames", "-m", "--first-parent", "-z", "-1"],
            )
            .add_dynamic_arguments([id.to_hex()])
            .add_dashes_and_list(Vec::<String>::new());
        let out = self.output(cmd).map_err(|e| missing_object(e, id))?;
        Ok(parse_name_status(&out))
    }

    fn diverging_commits(&self, ctx: &Context, base: &str, target: &str) -> Result<Divergence> {
        let cmd = self
            .git(ctx, ["rev-list", "--count", "--left-right"])
            .add_dynamic_arguments([format!("{base}...{target}")])
            .add_dashes_and_list(Vec::<String>::new());
        let out = self.output_string(cmd).map_err(|e| missing_object(e, format!("{base}...{target}")))?;
        let bad = || GitError::Parse(format!("bad rev-list count {:?}", out.trim()));
        let mut counts = out.split_whitespace().map(str::parse::<u64>);
        match (counts.next(), counts.next()) {
            (Some(Ok(behind)), Some(Ok(ahead))) => Ok(Divergence { ahead, behind }),
            _ => Err(bad()),
        }
    }

    fn nearest_branch(&self, ctx: &Context, id: &ObjectId) -> Result<Option<String>> {
        let cmd = self
            .git(ctx, ["name-rev", "--exclude", "refs/tags/*", "--name-only", "--no-undefined"])
            .add_dynamic_arguments([id.to_hex()]);
        match self.output_string(cmd) {
            Ok(out) => Ok(out
                .trim()
                .split(['~', '^'])
                .next()
                .filter(|name| !name.is_empty())
                .map(str::to_string)),
            Err(e) if no_name(&e) => Ok(None),
            Err(e) => Err(missing_object(e, id)),
        }
    }

    fn exact_tag(&self, ctx: &Context, id: &ObjectId) -> Result<Option<String>> {
        let cmd = self
            .git(ctx, ["describe", "--exact-match", "--tags"])
            .add_dynamic_arguments([id.to_hex()]);
        match self.output_string(cmd) {
            Ok(out) => Ok(Some(out.trim().to_string()).filter(|name| !name.is_empty())),
            Err(e) if no_name(&e) => Ok(None),
            Err(e) => Err(missing_object(e, id)),
        }
    }

    fn is_empty(&self, ctx: &Context) -> Result<bool> {
        match self.output_string(self.git(ctx, ["rev-parse", "--verify", "-q", "HEAD"])) {
            Ok(_) => Ok(false),
            Err(e) if e.is_exit_code(1) => Ok(true),
            Err(e) => Err(e),
        }
    }
}

fn rev_list_command(mut cmd: Command, query: &RevListQuery) -> Command {
    if query.all {
        cmd = cmd.add_arguments(["--all"]);
    }
    if query.skip > 0 {
        cmd = cmd.add_arguments([CmdArg::trusted(format!("--skip={}", query.skip))]);
    }
    if let Some(max) = query.max_count {
        cmd = cmd.add_arguments([CmdArg::trusted(format!("--max-count={max}"))]);
    }
    cmd.add_dynamic_arguments(query.revisions.iter().cloned())
        .add_dashes_and_list(query.paths.iter().map(|p| literal_path(p)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const TREE: &str = "4b825dc642cb6eb9a060e54bf8d69288fbee4904";
    const PARENT: &str = "ce013625030ba8dba906f756967f9e9ca394464a";

    #[test]
    fn parses_plain_commit() {
        let raw = format!(
            "tree {TREE}\nparent {PARENT}\nauthor A U Thor <a@example.com> 1700000000 +0000\ncommitter C O Mitter <c@example.com> 1700000100 +0200\n\nSubject\n\nBody\n"
        );
        let c = parse_commit(ObjectId::zero(), raw.as_bytes()).unwrap();
        assert_eq!(c.tree_id.to_string(), TREE);
        assert_eq!(c.parents.len(), 1);
        assert_eq!(c.author.name, "A U Thor");
        assert_eq!(c.committer.timestamp(), 1_700_000_100);
        assert_eq!(c.message, "Subject\n\nBody\n");
        assert!(c.signature.is_none());
    }

    #[test]
    fn signed_commit_payload_drops_signature_header() {
        let raw = format!(
            "tree {TREE}\nauthor A <a@x> 1 +0000\ncommitter A <a@x> 1 +0000\ngpgsig -----BEGIN PGP SIGNATURE-----\n \n abc\n -----END PGP SIGNATURE-----\n\nSigned\n"
        );
        let c = parse_commit(ObjectId::zero(), raw.as_bytes()).unwrap();
        let sig = c.signature.unwrap();
        assert_eq!(sig.signature, "-----BEGIN PGP SIGNATURE-----\n\nabc\n-----END PGP SIGNATURE-----\n");
        assert_eq!(
            sig.payload,
            format!("tree {TREE}\nauthor A <a@x> 1 +0000\ncommitter A <a@x> 1 +0000\n\nSigned\n")
        );
    }

    #[test]
    fn commit_without_tree_is_parse_error() {
        let raw = "author A <a@x> 1 +0000\ncommitter A <a@x> 1 +0000\n\nm";
        assert!(matches!(parse_commit(ObjectId::zero(), raw.as_bytes()), Err(GitError::Parse(_))));
    }

    #[test]
    fn parses_ls_tree_records() {
        let raw = format!(
            "100644 blob {PARENT}      6\tREADME.md\0040000 tree {TREE}       -\tsrc dir\0160000 commit {PARENT}       -\tvendor\0"
        );
        let entries = parse_ls_tree(raw.as_bytes()).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].name, "README.md");
        assert_eq!(entries[0].size, Some(6));
        assert_eq!(entries[1].name, "src dir");
        assert_eq!(entries[1].mode, EntryMode::Tree);
        assert_eq!(entries[1].size, None);
        assert_eq!(entries[2].mode, EntryMode::Commit);
    }

    #[test]
    fn parses_tag_object() {
        let raw = format!("object {PARENT}\ntype commit\ntag v1\ntagger T <t@x> 5 +0000\n\nrelease\n");
        let tag = parse_tag_object(ObjectId::zero(), raw.as_bytes()).unwrap();
        assert_eq!(tag.name, "v1");
        assert_eq!(tag.object.to_string(), PARENT);
        assert_eq!(tag.message, "release\n");
        assert!(tag.is_annotated());
    }

    #[test]
    fn parses_name_status_records() {
        let raw = b"\0M\0src/lib.rs\0A\0new file.txt\0D\0gone.txt\0T\0link\0A\0b.txt\0";
        let status = parse_name_status(raw);
        assert_eq!(status.added, ["b.txt", "new file.txt"]);
        assert_eq!(status.removed, ["gone.txt"]);
        assert_eq!(status.modified, ["src/lib.rs"]);
        assert_eq!(parse_name_status(b""), CommitFileStatus::default());
    }

    #[test]
    fn colon_paths_are_escaped() {
        assert_eq!(literal_path(":weird"), "\\:weird");
        assert_eq!(literal_path("a/b"), "a/b");
        assert_eq!(literal_path(""), ".");
    }

    #[test]
    fn option_like_revision_is_refused() {
        let backend = CliBackend::new("/nonexistent", Arc::new(Settings::default()));
        let err = backend.resolve(&Context::background(), "--output=/tmp/x").unwrap_err();
        assert!(matches!(err, GitError::BrokenCommand { .. }));
    }
}
