use serde::{Deserialize, Serialize};

use crate::track::Track;

/// Sparse set of changes to one track's properties.
///
/// `None` leaves the field untouched. For `name` and `language` an empty
/// string means "clear this field".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropertyPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_track: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forced_track: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled_track: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visual_impaired: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commentary: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crop_top: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crop_bottom: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crop_left: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crop_right: Option<u32>,
}

/// Value of one patch field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Flag(bool),
    Pixels(u32),
}

/// One editable track property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatchField {
    Name,
    Language,
    DefaultTrack,
    ForcedTrack,
    EnabledTrack,
    Original,
    VisualImpaired,
    Commentary,
    CropTop,
    CropBottom,
    CropLeft,
    CropRight,
}

enum Slot<'a> {
    Text(&'a mut Option<String>),
    Flag(&'a mut Option<bool>),
    Pixels(&'a mut Option<u32>),
}

impl PatchField {
    pub const ALL: [PatchField; 12] = [
        PatchField::Name,
        PatchField::Language,
        PatchField::DefaultTrack,
        PatchField::ForcedTrack,
        PatchField::EnabledTrack,
        PatchField::Original,
        PatchField::VisualImpaired,
        PatchField::Commentary,
        PatchField::CropTop,
        PatchField::CropBottom,
        PatchField::CropLeft,
        PatchField::CropRight,
    ];

    fn slot(self, patch: &mut PropertyPatch) -> Slot<'_> {
        match self {
            Self::Name => Slot::Text(&mut patch.name),
            Self::Language => Slot::Text(&mut patch.language),
            Self::DefaultTrack => Slot::Flag(&mut patch.default_track),
            Self::ForcedTrack => Slot::Flag(&mut patch.forced_track),
            Self::EnabledTrack => Slot::Flag(&mut patch.enabled_track),
            Self::Original => Slot::Flag(&mut patch.original),
            Self::VisualImpaired => Slot::Flag(&mut patch.visual_impaired),
            Self::Commentary => Slot::Flag(&mut patch.commentary),
            Self::CropTop => Slot::Pixels(&mut patch.crop_top),
            Self::CropBottom => Slot::Pixels(&mut patch.crop_bottom),
            Self::CropLeft => Slot::Pixels(&mut patch.crop_left),
            Self::CropRight => Slot::Pixels(&mut patch.crop_right),
        }
    }

    /// Value held by `patch` for this field, if any.
    pub fn get(self, patch: &PropertyPatch) -> Option<FieldValue> {
        match self {
            Self::Name => patch.name.clone().map(FieldValue::Text),
            Self::Language => patch.language.clone().map(FieldValue::Text),
            Self::DefaultTrack => patch.default_track.map(FieldValue::Flag),
            Self::ForcedTrack => patch.forced_track.map(FieldValue::Flag),
            Self::EnabledTrack => patch.enabled_track.map(FieldValue::Flag),
            Self::Original => patch.original.map(FieldValue::Flag),
            Self::VisualImpaired => patch.visual_impaired.map(FieldValue::Flag),
            Self::Commentary => patch.commentary.map(FieldValue::Flag),
            Self::CropTop => patch.crop_top.map(FieldValue::Pixels),
            Self::CropBottom => patch.crop_bottom.map(FieldValue::Pixels),
            Self::CropLeft => patch.crop_left.map(FieldValue::Pixels),
            Self::CropRight => patch.crop_right.map(FieldValue::Pixels),
        }
    }

    /// Stores `value` in `patch`. A value of the wrong kind leaves the patch unchanged.
    pub fn set(self, patch: &mut PropertyPatch, value: FieldValue) {
        match (self.slot(patch), value) {
            (Slot::Text(slot), FieldValue::Text(text)) => *slot = Some(text),
            (Slot::Flag(slot), FieldValue::Flag(flag)) => *slot = Some(flag),
            (Slot::Pixels(slot), FieldValue::Pixels(pixels)) => *slot = Some(pixels),
            _ => {}
        }
    }

    /// Current value of this field on the original track.
    ///
    /// An absent name or language reads as the empty string; absent flags and
    /// crop values stay absent.
    pub fn original(self, track: &Track) -> Option<FieldValue> {
        let text =
            |value: &Option<String>| Some(FieldValue::Text(value.clone().unwrap_or_default()));
        match self {
            Self::Name => text(&track.name),
            Self::Language => text(&track.language),
            Self::DefaultTrack => track.flags.default_track.map(FieldValue::Flag),
            Self::ForcedTrack => track.flags.forced_track.map(FieldValue::Flag),
            Self::EnabledTrack => track.flags.enabled_track.map(FieldValue::Flag),
            Self::Original => track.flags.original.map(FieldValue::Flag),
            Self::VisualImpaired => track.flags.visual_impaired.map(FieldValue::Flag),
            Self::Commentary => track.flags.commentary.map(FieldValue::Flag),
            Self::CropTop => track.crop.top.map(FieldValue::Pixels),
            Self::CropBottom => track.crop.bottom.map(FieldValue::Pixels),
            Self::CropLeft => track.crop.left.map(FieldValue::Pixels),
            Self::CropRight => track.crop.right.map(FieldValue::Pixels),
        }
    }

    /// Value assumed when neither a patch nor the track provides one.
    ///
    /// Tracks are enabled unless flagged otherwise; every other flag is off.
    pub fn default_value(self) -> FieldValue {
        match self {
            Self::Name | Self::Language => FieldValue::Text(String::new()),
            Self::EnabledTrack => FieldValue::Flag(true),
            Self::DefaultTrack
            | Self::ForcedTrack
            | Self::Original
            | Self::VisualImpaired
            | Self::Commentary => FieldValue::Flag(false),
            Self::CropTop | Self::CropBottom | Self::CropLeft | Self::CropRight => {
                FieldValue::Pixels(0)
            }
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Language => "language",
            Self::DefaultTrack => "default track",
            Self::ForcedTrack => "forced display",
            Self::EnabledTrack => "enabled",
            Self::Original => "original language",
            Self::VisualImpaired => "visual impaired",
            Self::Commentary => "commentary",
            Self::CropTop => "crop top",
            Self::CropBottom => "crop bottom",
            Self::CropLeft => "crop left",
            Self::CropRight => "crop right",
        }
    }
}

impl PropertyPatch {
    pub fn is_empty(&self) -> bool {
        PatchField::ALL.iter().all(|field| field.get(self).is_none())
    }

    /// Fields with a value, in declaration order.
    pub fn fields(&self) -> Vec<PatchField> {
        PatchField::ALL
            .into_iter()
            .filter(|field| field.get(self).is_some())
            .collect()
    }

    pub fn has_crop(&self) -> bool {
        self.crop_top.is_some()
            || self.crop_bottom.is_some()
            || self.crop_left.is_some()
            || self.crop_right.is_some()
    }

    /// Overwrites every field that `newer` sets; fields absent in `newer` are kept.
    ///
    /// # Example
    /// ```
    /// use engine::PropertyPatch;
    ///
    /// let mut merged = PropertyPatch {
    ///     name: Some("Main".to_string()),
    ///     default_track: Some(true),
    ///     ..PropertyPatch::default()
    /// };
    /// merged.merge_from(&PropertyPatch {
    ///     default_track: Some(false),
    ///     ..PropertyPatch::default()
    /// });
    /// assert_eq!(merged.name.as_deref(), Some("Main"));
    /// assert_eq!(merged.default_track, Some(false));
    /// ```
    pub fn merge_from(&mut self, newer: &PropertyPatch) {
        for field in PatchField::ALL {
            if let Some(value) = field.get(newer) {
                field.set(self, value);
            }
        }
    }

    /// Reduced patch holding only the fields whose value differs from `track`.
    pub fn changes_from(&self, track: &Track) -> PropertyPatch {
        let mut reduced = PropertyPatch::default();
        for field in PatchField::ALL {
            let Some(value) = field.get(self) else {
                continue;
            };
            if field.original(track).as_ref() != Some(&value) {
                field.set(&mut reduced, value);
            }
        }
        reduced
    }
}

/// Target aspect ratio for symmetric letterbox or pillarbox cropping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CropPreset {
    None,
    Widescreen,
    Scope,
    Flat,
    Classic,
    Square,
}

impl CropPreset {
    pub const ALL: [CropPreset; 6] = [
        CropPreset::None,
        CropPreset::Widescreen,
        CropPreset::Scope,
        CropPreset::Flat,
        CropPreset::Classic,
        CropPreset::Square,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Widescreen => "16:9 (1.78:1)",
            Self::Scope => "2.39:1 Scope",
            Self::Flat => "1.85:1 Flat",
            Self::Classic => "4:3 (1.33:1)",
            Self::Square => "1:1 Square",
        }
    }

    /// Width divided by height; `None` for [`CropPreset::None`].
    pub fn aspect_ratio(self) -> Option<f64> {
        match self {
            Self::None => None,
            Self::Widescreen => Some(16.0 / 9.0),
            Self::Scope => Some(2.39),
            Self::Flat => Some(1.85),
            Self::Classic => Some(4.0 / 3.0),
            Self::Square => Some(1.0),
        }
    }

    /// Crop patch bringing a `width` x `height` picture to this ratio.
    ///
    /// Wider sources lose equal columns left and right, taller ones equal
    /// rows top and bottom. A source within 0.01 of the ratio gets all-zero
    /// crop. Returns `None` for [`CropPreset::None`] or a zero dimension.
    ///
    /// # Example
    /// ```
    /// use engine::CropPreset;
    ///
    /// let patch = CropPreset::Classic.crop_patch(1920, 1080).expect("known size");
    /// assert_eq!((patch.crop_left, patch.crop_right), (Some(240), Some(240)));
    /// assert_eq!((patch.crop_top, patch.crop_bottom), (Some(0), Some(0)));
    /// ```
    pub fn crop_patch(self, width: u32, height: u32) -> Option<PropertyPatch> {
        let target = self.aspect_ratio()?;
        if width == 0 || height == 0 {
            return None;
        }
        let (width, height) = (f64::from(width), f64::from(height));
        let source = width / height;

        let mut patch = PropertyPatch {
            crop_top: Some(0),
            crop_bottom: Some(0),
            crop_left: Some(0),
            crop_right: Some(0),
            ..PropertyPatch::default()
        };
        if (source - target).abs() < 0.01 {
            return Some(patch);
        }
        if source > target {
            let side = ((width - height * target) / 2.0).round() as u32;
            patch.crop_left = Some(side);
            patch.crop_right = Some(side);
        } else {
            let side = ((height - width / target) / 2.0).round() as u32;
            patch.crop_top = Some(side);
            patch.crop_bottom = Some(side);
        }
        Some(patch)
    }
}

#[cfg(test)]
mod tests {
    use super::{CropPreset, FieldValue, PatchField, PropertyPatch};
    use crate::track::{PixelCrop, Track, TrackFlags, TrackType};

    fn subtitle_track() -> Track {
        Track {
            id: 2,
            uid: Some(77),
            track_type: TrackType::Subtitles,
            codec: "SubRip/SRT".to_string(),
            codec_id: None,
            name: None,
            language: Some("jpn".to_string()),
            flags: TrackFlags {
                default_track: Some(false),
                forced_track: Some(true),
                ..TrackFlags::default()
            },
            crop: PixelCrop::default(),
            pixel_size: None,
        }
    }

    #[test]
    fn default_patch_is_empty() {
        assert!(PropertyPatch::default().is_empty());
        let patch = PropertyPatch {
            crop_left: Some(0),
            ..PropertyPatch::default()
        };
        assert!(!patch.is_empty());
        assert_eq!(patch.fields(), vec![PatchField::CropLeft]);
    }

    #[test]
    fn set_ignores_value_of_wrong_kind() {
        let mut patch = PropertyPatch::default();
        PatchField::Name.set(&mut patch, FieldValue::Flag(true));
        assert!(patch.is_empty());
        PatchField::Name.set(&mut patch, FieldValue::Text("Signs".to_string()));
        assert_eq!(patch.name.as_deref(), Some("Signs"));
    }

    #[test]
    fn changes_from_keeps_only_differing_fields() {
        let patch = PropertyPatch {
            name: Some(String::new()),
            language: Some("eng".to_string()),
            default_track: Some(false),
            forced_track: Some(true),
            commentary: Some(false),
            ..PropertyPatch::default()
        };

        let reduced = patch.changes_from(&subtitle_track());

        assert_eq!(
            reduced,
            PropertyPatch {
                language: Some("eng".to_string()),
                commentary: Some(false),
                ..PropertyPatch::default()
            }
        );
    }

    #[test]
    fn patch_deserializes_from_sparse_json() {
        let patch: PropertyPatch =
            serde_json::from_str(r#"{"name":"Director","forced_track":false}"#)
                .expect("sparse patch json");
        assert_eq!(patch.name.as_deref(), Some("Director"));
        assert_eq!(patch.forced_track, Some(false));
        assert_eq!(patch.fields().len(), 2);
    }

    #[test]
    fn scope_preset_letterboxes_full_hd() {
        let patch = CropPreset::Scope.crop_patch(1920, 1080).expect("known size");
        assert_eq!(patch.crop_top, Some(138));
        assert_eq!(patch.crop_bottom, Some(138));
        assert_eq!((patch.crop_left, patch.crop_right), (Some(0), Some(0)));
    }

    #[test]
    fn narrower_presets_pillarbox_full_hd() {
        let square = CropPreset::Square.crop_patch(1920, 1080).expect("known size");
        assert_eq!((square.crop_left, square.crop_right), (Some(420), Some(420)));
        assert_eq!(square.crop_top, Some(0));

        let classic = CropPreset::Classic.crop_patch(1920, 1080).expect("known size");
        assert_eq!(classic.crop_left, Some(240));
    }

    #[test]
    fn matching_ratio_resets_crop_to_zero() {
        let patch = CropPreset::Widescreen.crop_patch(1920, 1080).expect("known size");
        assert_eq!(patch.fields().len(), 4);
        assert!(
            [patch.crop_top, patch.crop_bottom, patch.crop_left, patch.crop_right]
                .iter()
                .all(|value| *value == Some(0))
        );
        assert_eq!(patch.name, None);
    }

    #[test]
    fn no_preset_or_unknown_size_gives_no_crop() {
        assert_eq!(CropPreset::None.crop_patch(1920, 1080), None);
        assert_eq!(CropPreset::Scope.crop_patch(0, 1080), None);
        assert_eq!(CropPreset::Scope.crop_patch(1920, 0), None);
        assert_eq!(CropPreset::None.aspect_ratio(), None);
        assert_eq!(CropPreset::Flat.label(), "1.85:1 Flat");
    }

    mod prop {
        use super::*;
        use proptest::prelude::*;

        fn arb_text() -> impl Strategy<Value = String> {
            prop_oneof![Just(String::new()), Just("eng".to_string()), "[a-z]{1,4}"]
        }

        fn arb_patch() -> impl Strategy<Value = PropertyPatch> {
            let flag = || proptest::option::of(any::<bool>());
            let pixels = || proptest::option::of(0u32..4);
            (
                (proptest::option::of(arb_text()), proptest::option::of(arb_text())),
                (flag(), flag(), flag(), flag(), flag(), flag()),
                (pixels(), pixels(), pixels(), pixels()),
            )
                .prop_map(|((name, language), flags, crop)| PropertyPatch {
                    name,
                    language,
                    default_track: flags.0,
                    forced_track: flags.1,
                    enabled_track: flags.2,
                    original: flags.3,
                    visual_impaired: flags.4,
                    commentary: flags.5,
                    crop_top: crop.0,
                    crop_bottom: crop.1,
                    crop_left: crop.2,
                    crop_right: crop.3,
                })
        }

        fn arb_track() -> impl Strategy<Value = Track> {
            let flag = || proptest::option::of(any::<bool>());
            let pixels = || proptest::option::of(0u32..4);
            (
                (proptest::option::of(arb_text()), proptest::option::of(arb_text())),
                (flag(), flag(), flag(), flag(), flag(), flag()),
                (pixels(), pixels(), pixels(), pixels()),
            )
                .prop_map(|((name, language), flags, crop)| Track {
                    name,
                    language,
                    flags: TrackFlags {
                        default_track: flags.0,
                        forced_track: flags.1,
                        enabled_track: flags.2,
                        original: flags.3,
                        visual_impaired: flags.4,
                        commentary: flags.5,
                    },
                    crop: PixelCrop {
                        top: crop.0,
                        bottom: crop.1,
                        left: crop.2,
                        right: crop.3,
                    },
                    ..subtitle_track()
                })
        }

        proptest! {
            #[test]
            fn changes_are_a_subset_that_differs_from_the_track(
                patch in arb_patch(),
                track in arb_track()
            ) {
                let reduced = patch.changes_from(&track);
                for field in PatchField::ALL {
                    if let Some(value) = field.get(&reduced) {
                        prop_assert_eq!(field.get(&patch), Some(value.clone()));
                        prop_assert_ne!(field.original(&track), Some(value));
                    } else if let Some(value) = field.get(&patch) {
                        prop_assert_eq!(field.original(&track), Some(value));
                    }
                }
            }

            #[test]
            fn merging_keeps_the_newest_value_per_field(
                older in arb_patch(),
                newer in arb_patch()
            ) {
                let mut merged = older.clone();
                merged.merge_from(&newer);
                for field in PatchField::ALL {
                    let expected = field.get(&newer).or_else(|| field.get(&older));
                    prop_assert_eq!(field.get(&merged), expected);
                }
            }
        }
    }
}
