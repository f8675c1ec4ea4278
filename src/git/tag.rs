use std::collections::HashMap;

use serde::Serialize;

use crate::error::{GitError, Result};
use crate::git::backend::{CommitSignature, ObjectKind};
use crate::git::object_id::ObjectId;
use crate::git::signature::Signature;

pub const TAG_PREFIX: &str = "refs/tags/";

const SIGNATURE_MARKERS: [&str; 2] = [
    "-----BEGIN PGP SIGNATURE-----",
    "-----BEGIN SSH SIGNATURE-----",
];

/// Fields requested from `git for-each-ref` for tag listings.
const REF_FIELDS: [&str; 7] = [
    "objecttype",
    "refname:short",
    "object",
    "objectname",
    "creator",
    "contents",
    "contents:signature",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tag {
    pub name: String,
    /// The tag object for annotated tags, the commit for lightweight ones.
    pub id: ObjectId,
    /// What the tag points at.
    pub object: ObjectId,
    /// `Tag` for annotated tags, otherwise the kind of the tagged object.
    pub kind: ObjectKind,
    pub tagger: Option<Signature>,
    pub message: String,
    pub signature: Option<CommitSignature>,
}

impl Tag {
    /// Builds an annotated tag, moving a trailing signature out of `raw_message`.
    pub fn annotated(
        name: String,
        id: ObjectId,
        object: ObjectId,
        tagger: Option<Signature>,
        raw_message: &str,
    ) -> Self {
        let (message, signature) = split_signature(raw_message);
        let signature = signature.map(|signature| CommitSignature {
            payload: signed_payload(&object, &name, tagger.as_ref(), &message),
            signature,
        });
        Tag {
            name,
            id,
            object,
            kind: ObjectKind::Tag,
            tagger,
            message,
            signature,
        }
    }

    pub fn is_annotated(&self) -> bool {
        self.kind == ObjectKind::Tag
    }
}

fn signed_payload(object: &ObjectId, name: &str, tagger: Option<&Signature>, message: &str) -> String {
    let tagger = tagger.map(Signature::to_string).unwrap_or_default();
    format!(
        "object {object}\ntype commit\ntag {name}\ntagger {tagger}\n\n{}\n",
        message.trim()
    )
}

/// Splits a message into its text and an armored signature block, if any.
pub fn split_signature(raw: &str) -> (String, Option<String>) {
    let start = SIGNATURE_MARKERS
        .iter()
        .filter_map(|marker| raw.find(marker))
        .min();
    match start {
        Some(pos) => (raw[..pos].to_string(), Some(raw[pos..].to_string())),
        None => (raw.to_string(), None),
    }
}

/// `--format` argument producing `key value` fields separated by NUL, each
/// record ending with a double NUL.
pub fn for_each_ref_format() -> String {
    let fields: Vec<String> = REF_FIELDS
        .iter()
        .map(|f| format!("{f} %({f})"))
        .collect();
    format!("--format={}%00%00", fields.join("%00"))
}

/// Splits `for-each-ref` output produced with `for_each_ref_format`.
pub fn parse_ref_records(output: &[u8]) -> Vec<HashMap<String, String>> {
    let text = String::from_utf8_lossy(output);
    text.split("\0\0")
        .map(|record| record.trim_start_matches('\n'))
        .filter(|record| !record.is_empty())
        .map(|record| {
            record
                .split('\0')
                .filter_map(|field| {
                    let (key, value) = field.split_once(' ').unwrap_or((field, ""));
                    (!key.is_empty()).then(|| (key.to_string(), value.to_string()))
                })
                .collect()
        })
        .collect()
}

pub fn parse_tag_ref(fields: &HashMap<String, String>) -> Result<Tag> {
    let get = |key: &str| fields.get(key).map(String::as_str).unwrap_or_default();

    let name = get("refname:short").to_string();
    let id = ObjectId::from_hex(get("objectname"))
        .map_err(|_| GitError::Parse(format!("tag {name}: bad objectname {:?}", get("objectname"))))?;
    let tagger = match get("creator") {
        "" => None,
        creator => Some(Signature::parse(creator)?),
    };

    let kind: ObjectKind = get("objecttype").parse()?;
    if kind != ObjectKind::Tag {
        let (message, _) = split_signature(get("contents"));
        return Ok(Tag {
            name,
            id,
            object: id,
            kind,
            tagger,
            message,
            signature: None,
        });
    }

    let object = ObjectId::from_hex(get("object"))
        .map_err(|_| GitError::Parse(format!("tag {name}: bad object {:?}", get("object"))))?;
    let mut tag = Tag::annotated(name, id, object, tagger, get("contents"));
    if tag.signature.is_none() && !get("contents:signature").is_empty() {
        tag.signature = Some(CommitSignature {
            signature: get("contents:signature").to_string(),
            payload: signed_payload(&tag.object, &tag.name, tag.tagger.as_ref(), &tag.message),
        });
    }
    Ok(tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TAG_ID: &str = "1111111111111111111111111111111111111111";
    const COMMIT_ID: &str = "2222222222222222222222222222222222222222";

    fn record(fields: &[(&str, &str)]) -> String {
        let body: Vec<String> = fields.iter().map(|(k, v)| format!("{k} {v}")).collect();
        format!("{}\0\0\n", body.join("\0"))
    }

    #[test]
    fn format_lists_every_field() {
        let fmt = for_each_ref_format();
        assert!(fmt.starts_with("--format=objecttype %(objecttype)%00"));
        assert!(fmt.ends_with("contents:signature %(contents:signature)%00%00"));
    }

    #[test]
    fn parses_lightweight_and_annotated() {
        let mut out = record(&[
            ("objecttype", "tag"),
            ("refname:short", "v1.0"),
            ("object", COMMIT_ID),
            ("objectname", TAG_ID),
            ("creator", "Rel Eng <rel@example.com> 1700000000 +0000"),
            ("contents", "Release 1.0\n\nNotes\n"),
            ("contents:signature", ""),
        ]);
        out.push_str(&record(&[
            ("objecttype", "commit"),
            ("refname:short", "nightly"),
            ("object", ""),
            ("objectname", COMMIT_ID),
            ("creator", "Dev <dev@example.com> 1690000000 +0200"),
            ("contents", "Some commit\n"),
            ("contents:signature", ""),
        ]));

        let tags: Vec<Tag> = parse_ref_records(out.as_bytes())
            .iter()
            .map(parse_tag_ref)
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(tags.len(), 2);
        assert!(tags[0].is_annotated());
        assert_eq!(tags[0].name, "v1.0");
        assert_eq!(tags[0].object.to_string(), COMMIT_ID);
        assert_eq!(tags[0].message, "Release 1.0\n\nNotes\n");
        assert!(tags[0].signature.is_none());

        assert!(!tags[1].is_annotated());
        assert_eq!(tags[1].id, tags[1].object);
        assert_eq!(tags[1].tagger.as_ref().unwrap().name, "Dev");
    }

    #[test]
    fn signed_tag_moves_signature_out_of_message() {
        let sig = "-----BEGIN PGP SIGNATURE-----\nabc\n-----END PGP SIGNATURE-----\n";
        let contents = format!("Signed release\n{sig}");
        let out = record(&[
            ("objecttype", "tag"),
            ("refname:short", "v2.0"),
            ("object", COMMIT_ID),
            ("objectname", TAG_ID),
            ("creator", "Rel Eng <rel@example.com> 1700000000 +0000"),
            ("contents", &contents),
            ("contents:signature", sig),
        ]);
        let records = parse_ref_records(out.as_bytes());
        let tag = parse_tag_ref(&records[0]).unwrap();
        assert_eq!(tag.message, "Signed release\n");
        let signature = tag.signature.unwrap();
        assert_eq!(signature.signature, sig);
        assert_eq!(
            signature.payload,
            format!(
                "object {COMMIT_ID}\ntype commit\ntag v2.0\ntagger Rel Eng <rel@example.com> 1700000000 +0000\n\nSigned release\n"
            )
        );
    }

    #[test]
    fn bad_object_name_is_parse_error() {
        let out = record(&[("objecttype", "commit"), ("refname:short", "x"), ("objectname", "nope")]);
        let records = parse_ref_records(out.as_bytes());
        assert!(matches!(parse_tag_ref(&records[0]), Err(GitError::Parse(_))));
    }
}
