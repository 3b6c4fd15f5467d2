use std::collections::{BTreeMap, HashMap};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::debug;

use crate::error::ManifestError;
use crate::types::{ManifestInfo, MediaType, StreamInfo, TimelineMarker};

/// Parses a manifest document.
///
/// `manifest_url` is the URL the manifest was fetched from; relative stream
/// URLs are resolved against everything up to and including its last `/`
/// (or `\`). The parse is all-or-nothing: structural problems reject the
/// whole manifest, while chunk entries beyond the declared chunk count are
/// dropped silently.
pub fn parse_manifest(xml: &str, manifest_url: &str) -> Result<ManifestInfo, ManifestError> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();

    let mut saw_root = false;
    let mut attributes = HashMap::new();
    // Version attributes are optional; absent ones read as -1.
    let mut major_version = -1;
    let mut minor_version = -1;
    let mut streams: Vec<StreamInfo> = vec![];
    let mut markers: Vec<TimelineMarker> = vec![];

    // Ordinal of the StreamIndex being scanned, counting text tracks too.
    let mut stream_ordinal = 0usize;
    let mut current: Option<StreamScan> = None;
    let mut in_text_track = false;

    loop {
        let event = reader.read_event_into(&mut buf)?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let self_closing = matches!(event, Event::Empty(_));
                let name = e.name().to_owned();
                let tag = std::str::from_utf8(name.as_ref())?;

                if !saw_root && tag != "SmoothStreamingMedia" {
                    return Err(ManifestError::MissingRoot);
                }

                match tag {
                    "SmoothStreamingMedia" => {
                        saw_root = true;
                        for attr in e.attributes() {
                            let attr = attr?;
                            let key = std::str::from_utf8(attr.key.as_ref())?.to_string();
                            let value = attr.unescape_value()?.trim().to_string();
                            attributes.insert(key, value);
                        }
                        if let Some(raw) = attributes.get("MajorVersion") {
                            major_version =
                                parse_num("SmoothStreamingMedia", "MajorVersion", raw)?;
                        }
                        if let Some(raw) = attributes.get("MinorVersion") {
                            minor_version =
                                parse_num("SmoothStreamingMedia", "MinorVersion", raw)?;
                        }
                        if !attributes.contains_key("Duration") {
                            return Err(ManifestError::MissingDuration);
                        }
                    }
                    "StreamIndex" => {
                        // A new StreamIndex closes out its sibling.
                        if let Some(scan) = current.take() {
                            finish_into(&mut streams, scan)?;
                        }
                        in_text_track = false;

                        let position = stream_ordinal;
                        stream_ordinal += 1;

                        let mut type_attr = None;
                        let mut url = String::new();
                        let mut language = String::new();
                        let mut chunks_raw = None;
                        for attr in e.attributes() {
                            let attr = attr?;
                            match attr.key.as_ref() {
                                b"Type" => {
                                    type_attr = Some(attr.unescape_value()?.trim().to_string())
                                }
                                b"Url" => url = attr.unescape_value()?.trim().to_string(),
                                b"Language" => {
                                    language = attr.unescape_value()?.trim().to_string()
                                }
                                b"Chunks" => {
                                    chunks_raw = Some(attr.unescape_value()?.trim().to_string())
                                }
                                _ => {}
                            }
                        }

                        let type_attr = type_attr
                            .ok_or(ManifestError::MissingStreamType { position })?;
                        if type_attr.eq_ignore_ascii_case("text") {
                            // Text tracks only contribute timeline markers.
                            in_text_track = !self_closing;
                            continue;
                        }

                        let media_type = MediaType::from_type_attr(&type_attr).ok_or_else(|| {
                            ManifestError::UnknownMediaType {
                                position,
                                value: type_attr.clone(),
                            }
                        })?;
                        if url.is_empty() {
                            return Err(ManifestError::MissingStreamUrl { position });
                        }
                        let chunk_count = match chunks_raw {
                            Some(raw) => parse_num::<u32>("StreamIndex", "Chunks", &raw)?,
                            None => return Err(ManifestError::MissingChunkCount { position }),
                        };
                        if chunk_count == 0 {
                            return Err(ManifestError::MissingChunkCount { position });
                        }

                        let scan = StreamScan::new(
                            position,
                            media_type,
                            absolutize(manifest_url, &url),
                            language,
                            chunk_count,
                        );
                        if self_closing {
                            finish_into(&mut streams, scan)?;
                        } else {
                            current = Some(scan);
                        }
                    }
                    "QualityLevel" => {
                        if let Some(scan) = current.as_mut() {
                            scan.add_quality_level(e)?;
                        }
                    }
                    "c" => {
                        if let Some(scan) = current.as_mut() {
                            scan.add_chunk(e)?;
                        }
                    }
                    "Marker" => {
                        if in_text_track {
                            let mut time = None;
                            let mut text = None;
                            for attr in e.attributes() {
                                let attr = attr?;
                                match attr.key.as_ref() {
                                    b"Time" => {
                                        time = Some(parse_num::<u64>(
                                            "Marker",
                                            "Time",
                                            attr.unescape_value()?.trim(),
                                        )?)
                                    }
                                    b"Value" => {
                                        text = Some(attr.unescape_value()?.trim().to_string())
                                    }
                                    _ => {}
                                }
                            }
                            match (time, text) {
                                (Some(time), Some(text)) => markers.push(TimelineMarker {
                                    time,
                                    marker_type: "NAME".to_string(),
                                    text,
                                }),
                                _ => debug!("skipping Marker without Time and Value"),
                            }
                        }
                    }
                    "ScriptCommand" => {
                        if in_text_track {
                            let mut time = None;
                            let mut command_type = None;
                            let mut command = String::new();
                            for attr in e.attributes() {
                                let attr = attr?;
                                match attr.key.as_ref() {
                                    b"Time" => {
                                        time = Some(parse_num::<u64>(
                                            "ScriptCommand",
                                            "Time",
                                            attr.unescape_value()?.trim(),
                                        )?)
                                    }
                                    b"Type" => {
                                        command_type =
                                            Some(attr.unescape_value()?.trim().to_string())
                                    }
                                    b"Command" => {
                                        command = attr.unescape_value()?.trim().to_string()
                                    }
                                    _ => {}
                                }
                            }
                            match (time, command_type) {
                                (Some(time), Some(marker_type)) => markers.push(TimelineMarker {
                                    time,
                                    marker_type,
                                    text: command,
                                }),
                                _ => debug!("skipping ScriptCommand without Time and Type"),
                            }
                        }
                    }
                    _ => {}
                }
            }

            Event::End(ref e) => {
                let name = e.name().to_owned();
                let tag = std::str::from_utf8(name.as_ref())?;
                if tag == "StreamIndex" {
                    in_text_track = false;
                    if let Some(scan) = current.take() {
                        finish_into(&mut streams, scan)?;
                    }
                }
            }

            Event::Eof => break,
            _ => {}
        }

        buf.clear();
    }

    if !saw_root {
        return Err(ManifestError::MissingRoot);
    }
    if let Some(scan) = current.take() {
        finish_into(&mut streams, scan)?;
    }
    if streams.is_empty() {
        return Err(ManifestError::NoStreams);
    }

    Ok(ManifestInfo {
        major_version,
        minor_version,
        attributes,
        valid: true,
        streams,
        markers,
    })
}

/// Accumulates one audio/video StreamIndex while its children are scanned.
struct StreamScan {
    position: usize,
    media_type: MediaType,
    base_url: String,
    language: String,
    chunk_count: u32,
    bitrates: BTreeMap<u64, HashMap<String, String>>,
    chunk_durations: HashMap<u32, u64>,
    first_dims: Option<(u64, u64)>,
    first_level_seen: bool,
}

impl StreamScan {
    fn new(
        position: usize,
        media_type: MediaType,
        base_url: String,
        language: String,
        chunk_count: u32,
    ) -> StreamScan {
        StreamScan {
            position,
            media_type,
            base_url,
            language,
            chunk_count,
            bitrates: BTreeMap::new(),
            chunk_durations: HashMap::new(),
            first_dims: None,
            first_level_seen: false,
        }
    }

    fn add_quality_level(&mut self, e: &BytesStart) -> Result<(), ManifestError> {
        let mut attrs = HashMap::new();
        for attr in e.attributes() {
            let attr = attr?;
            let key = std::str::from_utf8(attr.key.as_ref())?.to_string();
            let value = attr.unescape_value()?.trim().to_string();
            attrs.insert(key, value);
        }

        let bitrate = match attrs.get("Bitrate") {
            Some(raw) => parse_num::<u64>("QualityLevel", "Bitrate", raw)?,
            None => {
                return Err(ManifestError::MissingAttribute {
                    element: "QualityLevel",
                    attribute: "Bitrate",
                })
            }
        };
        if attrs.contains_key("CodecPrivateData") && attrs.contains_key("WaveFormatEx") {
            return Err(ManifestError::ConflictingCodecData { bitrate });
        }

        if self.media_type == MediaType::Video && !self.first_level_seen {
            self.first_dims = parse_dims(&attrs)?;
        }
        self.first_level_seen = true;
        self.bitrates.insert(bitrate, attrs);
        Ok(())
    }

    fn add_chunk(&mut self, e: &BytesStart) -> Result<(), ManifestError> {
        let mut id = None;
        let mut duration = None;
        for attr in e.attributes() {
            let attr = attr?;
            match attr.key.as_ref() {
                b"n" => id = Some(parse_num::<u32>("c", "n", attr.unescape_value()?.trim())?),
                b"d" => {
                    duration = Some(parse_num::<u64>("c", "d", attr.unescape_value()?.trim())?)
                }
                _ => {}
            }
        }
        let (id, duration) = match (id, duration) {
            (Some(id), Some(duration)) => (id, duration),
            _ => {
                debug!(
                    "stream {}: skipping chunk element without n and d",
                    self.position
                );
                return Ok(());
            }
        };
        // Ids at or past the declared count are dropped, not errors; trick
        // manifests declare fewer chunks than they list.
        if id >= self.chunk_count {
            debug!(
                "stream {}: dropping chunk {} past declared count {}",
                self.position, id, self.chunk_count
            );
            return Ok(());
        }
        self.chunk_durations.insert(id, duration);
        Ok(())
    }

    /// Rewrites the top quality level's Width/Height so its aspect ratio
    /// matches the first quality level's. Both corrected candidates are
    /// rounded up to a multiple of 4; the candidate with the largest area
    /// wins, width correction beating height correction beating the
    /// declared values on ties.
    fn reconcile_video_geometry(&mut self) -> Result<(), ManifestError> {
        let (first_w, first_h) = match self.first_dims {
            Some(dims) if dims.0 > 0 && dims.1 > 0 => dims,
            _ => return Ok(()),
        };
        let max_bitrate = match self.bitrates.keys().next_back().copied() {
            Some(bitrate) => bitrate,
            None => return Ok(()),
        };
        let (max_w, max_h) = match self.bitrates.get(&max_bitrate) {
            Some(attrs) => match parse_dims(attrs)? {
                Some(dims) => dims,
                None => return Ok(()),
            },
            None => return Ok(()),
        };

        let aspect = first_w as f64 / first_h as f64;
        let scaled_width = round_up_to_multiple_of_4(max_h as f64 * aspect);
        let scaled_height = round_up_to_multiple_of_4(max_w as f64 / aspect);

        let mut best = (max_w, max_h);
        if max_w * scaled_height >= best.0 * best.1 {
            best = (max_w, scaled_height);
        }
        if scaled_width * max_h >= best.0 * best.1 {
            best = (scaled_width, max_h);
        }

        if best != (max_w, max_h) {
            debug!(
                "stream {}: correcting top level geometry {}x{} -> {}x{}",
                self.position, max_w, max_h, best.0, best.1
            );
            if let Some(attrs) = self.bitrates.get_mut(&max_bitrate) {
                attrs.insert("Width".to_string(), best.0.to_string());
                attrs.insert("Height".to_string(), best.1.to_string());
            }
        }
        Ok(())
    }

    fn finish(mut self, stream_index: usize) -> Result<StreamInfo, ManifestError> {
        if self.media_type == MediaType::Video {
            self.reconcile_video_geometry()?;
        }
        let description = match self.bitrates.keys().next_back().copied() {
            Some(max_bitrate) => self.bitrates.get(&max_bitrate).cloned().unwrap_or_default(),
            None => HashMap::new(),
        };
        Ok(StreamInfo {
            stream_index,
            media_type: self.media_type,
            base_url: self.base_url,
            language: self.language,
            chunk_count: self.chunk_count,
            bitrates: self.bitrates,
            chunk_durations: self.chunk_durations,
            description,
        })
    }
}

fn finish_into(streams: &mut Vec<StreamInfo>, scan: StreamScan) -> Result<(), ManifestError> {
    let stream_index = streams.len();
    let info = scan.finish(stream_index)?;
    streams.push(info);
    Ok(())
}

fn parse_dims(attrs: &HashMap<String, String>) -> Result<Option<(u64, u64)>, ManifestError> {
    let (w, h) = match (attrs.get("Width"), attrs.get("Height")) {
        (Some(w), Some(h)) => (w, h),
        _ => return Ok(None),
    };
    let width = parse_num::<u64>("QualityLevel", "Width", w)?;
    let height = parse_num::<u64>("QualityLevel", "Height", h)?;
    Ok(Some((width, height)))
}

fn round_up_to_multiple_of_4(value: f64) -> u64 {
    (value / 4.0).ceil() as u64 * 4
}

fn parse_num<T>(
    element: &'static str,
    attribute: &'static str,
    value: &str,
) -> Result<T, ManifestError>
where
    T: std::str::FromStr<Err = std::num::ParseIntError>,
{
    value
        .parse()
        .map_err(|source| ManifestError::InvalidNumber {
            element,
            attribute,
            value: value.to_string(),
            source,
        })
}

fn is_absolute_url(url: &str) -> bool {
    let prefix = "http://";
    url.get(..prefix.len())
        .map_or(false, |p| p.eq_ignore_ascii_case(prefix))
}

fn absolutize(manifest_url: &str, stream_url: &str) -> String {
    if is_absolute_url(stream_url) {
        return stream_url.to_string();
    }
    match manifest_url.rfind(|c| c == '/' || c == '\\') {
        Some(idx) => format!("{}{}", &manifest_url[..=idx], stream_url),
        None => stream_url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST_URL: &str = "http://media.example.com/show/video.ism/Manifest";

    fn video_manifest() -> &'static str {
        r#"<SmoothStreamingMedia MajorVersion="2" MinorVersion="0" Duration="1456860000">
  <StreamIndex Type="video" Subtype="WVC1" Chunks="3" Url="QualityLevels({bitrate})/Fragments(video={start time})">
    <QualityLevel Bitrate="350000" FourCC="WVC1" Width="640" Height="360" CodecPrivateData="AA"/>
    <QualityLevel Bitrate="2750000" FourCC="WVC1" Width="1280" Height="720" CodecPrivateData="BB"/>
    <c n="0" d="20000000"/>
    <c n="1" d="20000000"/>
    <c n="2" d="19500000"/>
    <c n="3" d="20000000"/>
  </StreamIndex>
  <StreamIndex Type="audio" Chunks="3" Url="QualityLevels({bitrate})/Fragments(audio={start time})" Language="eng">
    <QualityLevel Bitrate="64000" FourCC="AACL" WaveFormatEx="1000"/>
    <c n="0" d="20000000"/>
  </StreamIndex>
  <StreamIndex Type="text" Chunks="1" Url="ignored">
    <Marker Time="50000000" Value="chapter one"/>
    <ScriptCommand Time="90000000" Type="caption" Command="hello"/>
  </StreamIndex>
</SmoothStreamingMedia>"#
    }

    #[test]
    fn parses_streams_and_ladders() {
        let info = parse_manifest(video_manifest(), MANIFEST_URL).unwrap();
        assert!(info.valid);
        assert_eq!(info.major_version, 2);
        assert_eq!(info.minor_version, 0);
        assert_eq!(info.duration(), Some(1456860000));
        assert_eq!(info.streams.len(), 2);

        let video = &info.streams[0];
        assert_eq!(video.stream_index, 0);
        assert_eq!(video.media_type, MediaType::Video);
        assert_eq!(video.bitrate_ladder(), vec![350000, 2750000]);
        assert_eq!(video.max_bitrate(), Some(2750000));
        assert_eq!(video.chunk_count, 3);

        let audio = &info.streams[1];
        assert_eq!(audio.stream_index, 1);
        assert_eq!(audio.media_type, MediaType::Audio);
        assert_eq!(audio.language, "eng");
    }

    #[test]
    fn missing_version_attributes_default_to_minus_one() {
        let xml = r#"<SmoothStreamingMedia Duration="1"><StreamIndex Type="video" Chunks="1" Url="f({bitrate})"><QualityLevel Bitrate="100"/></StreamIndex></SmoothStreamingMedia>"#;
        let info = parse_manifest(xml, MANIFEST_URL).unwrap();
        assert_eq!(info.major_version, -1);
        assert_eq!(info.minor_version, -1);

        // Each attribute defaults independently.
        let xml = r#"<SmoothStreamingMedia MajorVersion="2" Duration="1"><StreamIndex Type="video" Chunks="1" Url="f({bitrate})"><QualityLevel Bitrate="100"/></StreamIndex></SmoothStreamingMedia>"#;
        let info = parse_manifest(xml, MANIFEST_URL).unwrap();
        assert_eq!(info.major_version, 2);
        assert_eq!(info.minor_version, -1);
    }

    #[test]
    fn resolves_relative_stream_urls() {
        let info = parse_manifest(video_manifest(), MANIFEST_URL).unwrap();
        assert_eq!(
            info.streams[0].base_url,
            "http://media.example.com/show/video.ism/QualityLevels({bitrate})/Fragments(video={start time})"
        );
        let url = info.streams[0].chunk_url(350000, 40000000);
        assert_eq!(
            url,
            "http://media.example.com/show/video.ism/QualityLevels(350000)/Fragments(video=40000000)"
        );
    }

    #[test]
    fn absolute_stream_urls_pass_through() {
        let xml = r#"<SmoothStreamingMedia Duration="1"><StreamIndex Type="video" Chunks="1" Url="HTTP://cdn.example.com/v({bitrate})"><QualityLevel Bitrate="100"/></StreamIndex></SmoothStreamingMedia>"#;
        let info = parse_manifest(xml, MANIFEST_URL).unwrap();
        assert_eq!(info.streams[0].base_url, "HTTP://cdn.example.com/v({bitrate})");
    }

    #[test]
    fn backslash_manifest_urls_resolve() {
        let xml = r#"<SmoothStreamingMedia Duration="1"><StreamIndex Type="video" Chunks="1" Url="f({bitrate})"><QualityLevel Bitrate="100"/></StreamIndex></SmoothStreamingMedia>"#;
        let info = parse_manifest(xml, r"C:\media\show\video.ism").unwrap();
        assert_eq!(info.streams[0].base_url, r"C:\media\show\f({bitrate})");
    }

    #[test]
    fn chunk_past_declared_count_is_dropped() {
        let info = parse_manifest(video_manifest(), MANIFEST_URL).unwrap();
        let video = &info.streams[0];
        assert_eq!(video.chunk_durations.len(), 3);
        assert_eq!(video.chunk_durations.get(&2), Some(&19500000));
        assert_eq!(video.chunk_durations.get(&3), None);
    }

    #[test]
    fn text_tracks_become_markers() {
        let info = parse_manifest(video_manifest(), MANIFEST_URL).unwrap();
        assert_eq!(info.markers.len(), 2);
        assert_eq!(info.markers[0].time, 50000000);
        assert_eq!(info.markers[0].marker_type, "NAME");
        assert_eq!(info.markers[0].text, "chapter one");
        assert_eq!(info.markers[1].marker_type, "caption");
        assert_eq!(info.markers[1].text, "hello");
    }

    #[test]
    fn missing_root_is_rejected() {
        let err = parse_manifest("<Other Duration=\"1\"/>", MANIFEST_URL).unwrap_err();
        assert!(matches!(err, ManifestError::MissingRoot));
    }

    #[test]
    fn missing_duration_is_rejected() {
        let xml = r#"<SmoothStreamingMedia MajorVersion="2"><StreamIndex Type="video" Chunks="1" Url="u"/></SmoothStreamingMedia>"#;
        let err = parse_manifest(xml, MANIFEST_URL).unwrap_err();
        assert!(matches!(err, ManifestError::MissingDuration));
    }

    #[test]
    fn manifest_without_streams_is_rejected() {
        let xml = r#"<SmoothStreamingMedia Duration="1"></SmoothStreamingMedia>"#;
        let err = parse_manifest(xml, MANIFEST_URL).unwrap_err();
        assert!(matches!(err, ManifestError::NoStreams));
    }

    #[test]
    fn text_only_manifest_is_rejected() {
        let xml = r#"<SmoothStreamingMedia Duration="1"><StreamIndex Type="text" Chunks="1" Url="u"><Marker Time="1" Value="x"/></StreamIndex></SmoothStreamingMedia>"#;
        let err = parse_manifest(xml, MANIFEST_URL).unwrap_err();
        assert!(matches!(err, ManifestError::NoStreams));
    }

    #[test]
    fn unknown_stream_type_is_rejected() {
        let xml = r#"<SmoothStreamingMedia Duration="1"><StreamIndex Type="binary" Chunks="1" Url="u"/></SmoothStreamingMedia>"#;
        let err = parse_manifest(xml, MANIFEST_URL).unwrap_err();
        assert!(matches!(
            err,
            ManifestError::UnknownMediaType { position: 0, .. }
        ));
    }

    #[test]
    fn zero_chunk_count_is_rejected() {
        let xml = r#"<SmoothStreamingMedia Duration="1"><StreamIndex Type="video" Chunks="0" Url="u"/></SmoothStreamingMedia>"#;
        let err = parse_manifest(xml, MANIFEST_URL).unwrap_err();
        assert!(matches!(
            err,
            ManifestError::MissingChunkCount { position: 0 }
        ));
    }

    #[test]
    fn conflicting_codec_data_is_rejected() {
        let xml = r#"<SmoothStreamingMedia Duration="1"><StreamIndex Type="audio" Chunks="1" Url="u"><QualityLevel Bitrate="64000" CodecPrivateData="AA" WaveFormatEx="BB"/></StreamIndex></SmoothStreamingMedia>"#;
        let err = parse_manifest(xml, MANIFEST_URL).unwrap_err();
        assert!(matches!(
            err,
            ManifestError::ConflictingCodecData { bitrate: 64000 }
        ));
    }

    #[test]
    fn malformed_chunk_duration_is_rejected() {
        let xml = r#"<SmoothStreamingMedia Duration="1"><StreamIndex Type="video" Chunks="1" Url="u"><QualityLevel Bitrate="100"/><c n="0" d="fast"/></StreamIndex></SmoothStreamingMedia>"#;
        let err = parse_manifest(xml, MANIFEST_URL).unwrap_err();
        assert!(matches!(
            err,
            ManifestError::InvalidNumber {
                element: "c",
                attribute: "d",
                ..
            }
        ));
    }

    #[test]
    fn consistent_geometry_stays_untouched() {
        let info = parse_manifest(video_manifest(), MANIFEST_URL).unwrap();
        let video = &info.streams[0];
        assert_eq!(video.description.get("Width").map(String::as_str), Some("1280"));
        assert_eq!(video.description.get("Height").map(String::as_str), Some("720"));
    }

    #[test]
    fn widescreen_first_level_widens_top_level() {
        // First level 848x480 (~1.767), top level declares 4:3 1280x960.
        // Width correction: 1.767 * 960 = 1696 -> 1696x960 (largest area).
        let xml = r#"<SmoothStreamingMedia Duration="1">
  <StreamIndex Type="video" Chunks="1" Url="u">
    <QualityLevel Bitrate="100" Width="848" Height="480"/>
    <QualityLevel Bitrate="200" Width="1280" Height="960"/>
  </StreamIndex>
</SmoothStreamingMedia>"#;
        let info = parse_manifest(xml, MANIFEST_URL).unwrap();
        let video = &info.streams[0];
        assert_eq!(video.description.get("Width").map(String::as_str), Some("1696"));
        assert_eq!(video.description.get("Height").map(String::as_str), Some("960"));
    }

    #[test]
    fn tall_first_level_raises_top_level() {
        // First level 640x640 (1:1), top level 1280x720. Width correction
        // gives 720x720; height correction gives 1280x1280, the largest.
        let xml = r#"<SmoothStreamingMedia Duration="1">
  <StreamIndex Type="video" Chunks="1" Url="u">
    <QualityLevel Bitrate="100" Width="640" Height="640"/>
    <QualityLevel Bitrate="200" Width="1280" Height="720"/>
  </StreamIndex>
</SmoothStreamingMedia>"#;
        let info = parse_manifest(xml, MANIFEST_URL).unwrap();
        let video = &info.streams[0];
        assert_eq!(video.description.get("Width").map(String::as_str), Some("1280"));
        assert_eq!(video.description.get("Height").map(String::as_str), Some("1280"));
    }

    #[test]
    fn corrected_dimensions_round_up_to_multiple_of_4() {
        // First level 424x240 (~1.767), top level 1000x562. Width candidate
        // 1.767 * 562 = 992.9 -> 996; 996x562 beats 1000x566? height
        // candidate 1000/1.767 = 566.0 -> 568. Areas: declared 562000,
        // width 559752, height 568000 -> height correction wins.
        let xml = r#"<SmoothStreamingMedia Duration="1">
  <StreamIndex Type="video" Chunks="1" Url="u">
    <QualityLevel Bitrate="100" Width="424" Height="240"/>
    <QualityLevel Bitrate="200" Width="1000" Height="562"/>
  </StreamIndex>
</SmoothStreamingMedia>"#;
        let info = parse_manifest(xml, MANIFEST_URL).unwrap();
        let video = &info.streams[0];
        assert_eq!(video.description.get("Width").map(String::as_str), Some("1000"));
        assert_eq!(video.description.get("Height").map(String::as_str), Some("568"));
    }

    #[test]
    fn description_tracks_highest_bitrate() {
        let info = parse_manifest(video_manifest(), MANIFEST_URL).unwrap();
        let video = &info.streams[0];
        assert_eq!(
            video.description.get("CodecPrivateData").map(String::as_str),
            Some("BB")
        );
    }
}
