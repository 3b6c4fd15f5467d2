use smooth_manifest::{parse_manifest, MediaType};

const MANIFEST_URL: &str = "http://cdn.example.com/events/race/stream.ism/Manifest";

// A manifest the way a packager actually emits one: a full video ladder,
// one audio stream, a sparse text track, mixed placeholder spellings.
fn presentation() -> &'static str {
    r#"<?xml version="1.0" encoding="utf-8"?>
<SmoothStreamingMedia MajorVersion="2" MinorVersion="2" Duration="1200000000" TimeScale="10000000">
  <StreamIndex Type="video" Name="video" Chunks="6" QualityLevels="4" MaxWidth="1920" MaxHeight="1080" Url="QualityLevels({Bitrate})/Fragments(video={start_time})">
    <QualityLevel Index="0" Bitrate="450000" FourCC="H264" Width="480" Height="270" CodecPrivateData="00"/>
    <QualityLevel Index="1" Bitrate="900000" FourCC="H264" Width="848" Height="480" CodecPrivateData="01"/>
    <QualityLevel Index="2" Bitrate="1800000" FourCC="H264" Width="1280" Height="720" CodecPrivateData="02"/>
    <QualityLevel Index="3" Bitrate="3500000" FourCC="H264" Width="1920" Height="1080" CodecPrivateData="03"/>
    <c n="0" d="20000000"/>
    <c n="1" d="20000000"/>
    <c n="2" d="20000000"/>
    <c n="3" d="20000000"/>
    <c n="4" d="20000000"/>
    <c n="5" d="19800000"/>
  </StreamIndex>
  <StreamIndex Type="audio" Name="audio" Language="nld" Chunks="6" QualityLevels="1" Url="QualityLevels({bitrate})/Fragments(audio={start time})">
    <QualityLevel Index="0" Bitrate="128000" FourCC="AACL" SamplingRate="48000" Channels="2" WaveFormatEx="1190"/>
    <c n="0" d="20000000"/>
    <c n="1" d="20000000"/>
    <c n="2" d="20000000"/>
    <c n="3" d="20000000"/>
    <c n="4" d="20000000"/>
    <c n="5" d="19800000"/>
  </StreamIndex>
  <StreamIndex Type="text" Name="events" Chunks="1" Url="QualityLevels({bitrate})/Fragments(events={start time})">
    <Marker Time="0" Value="start"/>
    <ScriptCommand Time="600000000" Type="AdInsert" Command="break-1"/>
    <Marker Time="1100000000" Value="finish"/>
  </StreamIndex>
</SmoothStreamingMedia>"#
}

#[test]
fn full_presentation_round_trip() {
    let info = parse_manifest(presentation(), MANIFEST_URL).unwrap();
    assert!(info.valid);
    assert_eq!((info.major_version, info.minor_version), (2, 2));
    assert_eq!(info.duration(), Some(1_200_000_000));
    assert_eq!(info.attributes.get("TimeScale").map(String::as_str), Some("10000000"));

    // text never consumes a stream id
    assert_eq!(info.streams.len(), 2);
    let video = &info.streams[0];
    let audio = &info.streams[1];
    assert_eq!(video.stream_index, 0);
    assert_eq!(video.media_type, MediaType::Video);
    assert_eq!(
        video.bitrate_ladder(),
        vec![450_000, 900_000, 1_800_000, 3_500_000]
    );
    assert_eq!(video.chunk_count, 6);
    assert_eq!(video.chunk_durations.get(&5), Some(&19_800_000));
    assert_eq!(audio.stream_index, 1);
    assert_eq!(audio.media_type, MediaType::Audio);
    assert_eq!(audio.language, "nld");
    assert_eq!(audio.max_bitrate(), Some(128_000));
}

#[test]
fn chunk_urls_resolve_against_the_manifest_location() {
    let info = parse_manifest(presentation(), MANIFEST_URL).unwrap();
    // {Bitrate} and {start_time} spellings both substitute
    assert_eq!(
        info.streams[0].chunk_url(1_800_000, 40_000_000),
        "http://cdn.example.com/events/race/stream.ism/QualityLevels(1800000)/Fragments(video=40000000)"
    );
    assert_eq!(
        info.streams[1].chunk_url(128_000, 0),
        "http://cdn.example.com/events/race/stream.ism/QualityLevels(128000)/Fragments(audio=0)"
    );
}

#[test]
fn description_reflects_the_top_quality_level() {
    let info = parse_manifest(presentation(), MANIFEST_URL).unwrap();
    let description = &info.streams[0].description;
    assert_eq!(description.get("Bitrate").map(String::as_str), Some("3500000"));
    // consistent 16:9 ladder: reconciliation leaves the dimensions alone
    assert_eq!(description.get("Width").map(String::as_str), Some("1920"));
    assert_eq!(description.get("Height").map(String::as_str), Some("1080"));
}

#[test]
fn timeline_markers_keep_declaration_order() {
    let info = parse_manifest(presentation(), MANIFEST_URL).unwrap();
    let kinds: Vec<(&str, &str, u64)> = info
        .markers
        .iter()
        .map(|m| (m.marker_type.as_str(), m.text.as_str(), m.time))
        .collect();
    assert_eq!(
        kinds,
        vec![
            ("NAME", "start", 0),
            ("AdInsert", "break-1", 600_000_000),
            ("NAME", "finish", 1_100_000_000),
        ]
    );
}
