//! Pipeline recipes: the closed set of supported topologies.
//!
//! Instead of re-checking the file extension at every wiring step, the path
//! is classified once into a [`Recipe`], and each recipe declares its element
//! list and link plan. The graph builder executes the plan mechanically.

/// Which fixed topology to build for a given input file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Recipe {
    /// MP3: source → decoder → sample converter → sink, all linked eagerly.
    CompressedAudio,
    /// WAV: source → decoder → sink, with the decoder→sink link deferred
    /// until the decoder has parsed the container header and announced its
    /// output pad.
    UncompressedAudio,
}

/// The kinds of framework elements a recipe can instantiate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElementKind {
    FileSource,
    Mp3Decoder,
    WavDecoder,
    SampleConverter,
    DeviceSink,
}

/// When a link is established.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkMode {
    /// Linked during setup; failure is a fatal setup error.
    Immediate,
    /// Registered as a one-shot subscription, completed when the upstream
    /// element announces a newly available output pad.
    OnPadAdded,
}

/// One edge of the element graph. Indices refer to [`Recipe::elements`] order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Link {
    pub upstream: usize,
    pub downstream: usize,
    pub mode: LinkMode,
}

const fn link(upstream: usize, downstream: usize, mode: LinkMode) -> Link {
    Link {
        upstream,
        downstream,
        mode,
    }
}

const COMPRESSED_ELEMENTS: &[ElementKind] = &[
    ElementKind::FileSource,
    ElementKind::Mp3Decoder,
    ElementKind::SampleConverter,
    ElementKind::DeviceSink,
];

const COMPRESSED_LINKS: &[Link] = &[
    link(0, 1, LinkMode::Immediate),
    link(1, 2, LinkMode::Immediate),
    link(2, 3, LinkMode::Immediate),
];

const UNCOMPRESSED_ELEMENTS: &[ElementKind] = &[
    ElementKind::FileSource,
    ElementKind::WavDecoder,
    ElementKind::DeviceSink,
];

const UNCOMPRESSED_LINKS: &[Link] = &[
    link(0, 1, LinkMode::Immediate),
    link(1, 2, LinkMode::OnPadAdded),
];

impl Recipe {
    /// Classify a path by the extension contract: a case-sensitive substring
    /// match, with `".mp3"` checked before `".wav"` so a pathological path
    /// containing both takes the MP3 topology.
    pub fn for_path(path: &str) -> Option<Recipe> {
        if path.contains(".mp3") {
            Some(Recipe::CompressedAudio)
        } else if path.contains(".wav") {
            Some(Recipe::UncompressedAudio)
        } else {
            None
        }
    }

    /// Elements to instantiate, in creation order.
    pub fn elements(self) -> &'static [ElementKind] {
        match self {
            Recipe::CompressedAudio => COMPRESSED_ELEMENTS,
            Recipe::UncompressedAudio => UNCOMPRESSED_ELEMENTS,
        }
    }

    /// Link plan connecting adjacent elements.
    pub fn links(self) -> &'static [Link] {
        match self {
            Recipe::CompressedAudio => COMPRESSED_LINKS,
            Recipe::UncompressedAudio => UNCOMPRESSED_LINKS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mp3_path_selects_compressed() {
        assert_eq!(
            Recipe::for_path("/music/track.mp3"),
            Some(Recipe::CompressedAudio)
        );
    }

    #[test]
    fn wav_path_selects_uncompressed() {
        assert_eq!(
            Recipe::for_path("/music/track.wav"),
            Some(Recipe::UncompressedAudio)
        );
    }

    #[test]
    fn path_with_both_extensions_takes_mp3() {
        assert_eq!(
            Recipe::for_path("/music/track.wav.mp3"),
            Some(Recipe::CompressedAudio)
        );
        assert_eq!(
            Recipe::for_path("/music/track.mp3.wav"),
            Some(Recipe::CompressedAudio)
        );
    }

    #[test]
    fn extension_match_is_case_sensitive() {
        assert_eq!(Recipe::for_path("/music/track.MP3"), None);
        assert_eq!(Recipe::for_path("/music/track.WAV"), None);
    }

    #[test]
    fn unrecognized_extension_is_rejected() {
        assert_eq!(Recipe::for_path("/music/track.flac"), None);
        assert_eq!(Recipe::for_path("/music/track"), None);
    }

    #[test]
    fn compressed_recipe_links_four_elements_eagerly() {
        let recipe = Recipe::CompressedAudio;
        assert_eq!(recipe.elements().len(), 4);
        assert!(
            recipe
                .links()
                .iter()
                .all(|l| l.mode == LinkMode::Immediate)
        );
    }

    #[test]
    fn uncompressed_recipe_defers_decoder_to_sink() {
        let recipe = Recipe::UncompressedAudio;
        assert_eq!(
            recipe.elements(),
            &[
                ElementKind::FileSource,
                ElementKind::WavDecoder,
                ElementKind::DeviceSink
            ]
        );
        let deferred: Vec<_> = recipe
            .links()
            .iter()
            .filter(|l| l.mode == LinkMode::OnPadAdded)
            .collect();
        assert_eq!(deferred.len(), 1);
        assert_eq!(deferred[0].upstream, 1);
        assert_eq!(deferred[0].downstream, 2);
    }
}
