//! Property tests for the artifact cache metadata format.

use std::path::PathBuf;

use proptest::prelude::*;

use zkl_zkp::cache::ArtifactMetadata;

fn artifact_path() -> impl Strategy<Value = PathBuf> {
    "[A-Za-z0-9_./-]{0,16}:[A-Za-z0-9_./:-]{0,16}".prop_map(PathBuf::from)
}

proptest! {
    #[test]
    fn metadata_survives_render_and_parse(
        source_modified in any::<u128>(),
        artifacts in prop::collection::vec((artifact_path(), any::<u128>()), 0..6),
    ) {
        let meta = ArtifactMetadata { source_modified, artifacts };
        prop_assert_eq!(ArtifactMetadata::parse(&meta.render()).unwrap(), meta);
    }

    #[test]
    fn a_line_without_a_separator_is_malformed(path in "[A-Za-z0-9_./-]{1,16}") {
        let text = format!("1\n{path}\n");
        prop_assert!(ArtifactMetadata::parse(&text).is_err());
    }
}
