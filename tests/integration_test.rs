extern crate nwaudio;

use std::io::{Cursor, Read, Seek, SeekFrom, Write};

use byteorder::{BigEndian, LittleEndian, ReadBytesExt, WriteBytesExt};

use nwaudio::convert;
use nwaudio::{
    ChannelCodecInfo, DspAdpcmInfo, Endian, Error, Project, Riff, SoundArchive, SoundEncoding,
    Stream, StringBlock, Track, Wave, WaveArchive,
};

fn reference(f: &mut Vec<u8>, identifier: u16, offset: u32) {
    f.write_u16::<LittleEndian>(identifier).unwrap();
    f.write_u16::<LittleEndian>(0).unwrap();
    f.write_u32::<LittleEndian>(offset).unwrap();
}

/// A hand-assembled CWAV: PCM8, two channels of 100 samples, not looping.
fn cwav_pcm8_fixture() -> Vec<u8> {
    let mut f = vec![];
    f.write_all(b"CWAV").unwrap();
    f.write_u16::<LittleEndian>(0xFEFF).unwrap();
    f.write_u16::<LittleEndian>(0x40).unwrap();
    f.write_u32::<LittleEndian>(0x0201_0000).unwrap();
    f.write_u32::<LittleEndian>(0xA0 + 232).unwrap();
    f.write_u16::<LittleEndian>(2).unwrap();
    f.write_u16::<LittleEndian>(0).unwrap();
    reference(&mut f, 0x7000, 0x40);
    f.write_u32::<LittleEndian>(0x60).unwrap();
    reference(&mut f, 0x7001, 0xA0);
    f.write_u32::<LittleEndian>(232).unwrap();
    f.resize(0x40, 0);

    f.write_all(b"INFO").unwrap();
    f.write_u32::<LittleEndian>(0x60).unwrap();
    f.write_u8(0).unwrap(); // PCM8
    f.write_u8(0).unwrap();
    f.write_u16::<LittleEndian>(0).unwrap();
    f.write_u32::<LittleEndian>(32000).unwrap();
    f.write_u32::<LittleEndian>(0).unwrap();
    f.write_u32::<LittleEndian>(100).unwrap();
    f.write_u32::<LittleEndian>(0).unwrap();

    f.write_u32::<LittleEndian>(2).unwrap();
    reference(&mut f, 0x7100, 20);
    reference(&mut f, 0x7100, 40);
    for channel in 0..2u32 {
        reference(&mut f, 0x1F00, 0x18 + channel * 100);
        reference(&mut f, 0, 0xFFFF_FFFF);
        f.write_u32::<LittleEndian>(0).unwrap();
    }
    f.resize(0xA0, 0);

    f.write_all(b"DATA").unwrap();
    f.write_u32::<LittleEndian>(232).unwrap();
    f.write_all(&[0; 0x18]).unwrap();
    f.extend(0..100u8);
    f.extend((0..100u8).map(|i| !i));
    f
}

fn ramp(len: usize, step: i16) -> Vec<i16> {
    (0..len).map(|i| (i as i16).wrapping_mul(step)).collect()
}

fn dsp_info(seed: i16) -> DspAdpcmInfo {
    let mut info = DspAdpcmInfo::default();
    for (i, c) in info.coefficients.iter_mut().enumerate() {
        *c = seed.wrapping_mul(i as i16 + 1);
    }
    info.predictor_scale = 0x17;
    info.yn1 = -seed;
    info.loop_predictor_scale = 0x22;
    info
}

fn dsp_stream(sample_count: u64) -> Stream {
    let len = SoundEncoding::DspAdpcm.bytes_for_samples(sample_count) as usize;
    Stream::build(
        SoundEncoding::DspAdpcm,
        32000,
        vec![ChannelCodecInfo::Dsp(dsp_info(3)), ChannelCodecInfo::Dsp(dsp_info(-5))],
        vec![
            (0..len).map(|i| i as u8).collect(),
            (0..len).map(|i| (i * 7) as u8).collect(),
        ],
        sample_count,
    )
    .unwrap()
}

#[test]
fn test_pcm8_wave_fixture() -> Result<(), Error> {
    let fixture = cwav_pcm8_fixture();
    let wave = Wave::load(&fixture)?;

    assert_eq!(wave.encoding, SoundEncoding::Pcm8);
    assert_eq!(wave.channels.len(), 2);
    assert_eq!(wave.samples[0].len(), 100);
    assert_eq!(wave.samples[1][1], 0xFE);
    assert_eq!(wave.sample_rate, 32000);
    assert!(!wave.looping);
    assert_eq!(wave.sample_count(), 100);
    Ok(())
}

#[test]
fn test_pcm8_wave_rewrites_identically() -> Result<(), Error> {
    let fixture = cwav_pcm8_fixture();
    let wave = Wave::load(&fixture)?;
    assert_eq!(wave.to_bytes()?, fixture);
    Ok(())
}

#[test]
fn test_bad_magic_everywhere() {
    let mut junk = b"XXXX".to_vec();
    junk.resize(0x80, 0);

    let expect_magic = |result: Result<(), Error>| match result {
        Err(Error::InvalidMagic { found }) => assert_eq!(String::from(found), "XXXX"),
        other => panic!("expected InvalidMagic, got {:?}", other),
    };
    expect_magic(Stream::load(&junk).map(|_| ()));
    expect_magic(Wave::load(&junk).map(|_| ()));
    expect_magic(WaveArchive::load(&junk).map(|_| ()));
    expect_magic(SoundArchive::load(&junk).map(|_| ()));
    expect_magic(Project::load(&junk).map(|_| ()));
    expect_magic(Riff::load(&junk).map(|_| ()));
}

#[test]
fn test_wave_archive_entries() -> Result<(), Error> {
    let sizes = [37usize, 64, 3];
    let mut archive = WaveArchive::default();
    for (i, &len) in sizes.iter().enumerate() {
        let wave = Wave::build(
            SoundEncoding::Pcm8,
            8000,
            vec![ChannelCodecInfo::None],
            vec![vec![i as u8 + 1; len]],
        )?;
        archive.push(&wave)?;
    }
    let bytes = archive.to_bytes()?;

    let mut r = Cursor::new(&bytes);
    r.seek(SeekFrom::Start(0x14))?;
    let _info_id = r.read_u32::<LittleEndian>()?;
    let info_at = r.read_u32::<LittleEndian>()? as u64;
    let _info_size = r.read_u32::<LittleEndian>()?;
    let _file_id = r.read_u32::<LittleEndian>()?;
    let file_at = r.read_u32::<LittleEndian>()? as u64;

    r.seek(SeekFrom::Start(info_at + 8))?;
    assert_eq!(r.read_u32::<LittleEndian>()?, 3);
    let mut entries = vec![];
    for _ in 0..3 {
        assert_eq!(r.read_u16::<LittleEndian>()?, 0x1F00);
        let _padding = r.read_u16::<LittleEndian>()?;
        let offset = r.read_u32::<LittleEndian>()? as u64;
        let size = r.read_u32::<LittleEndian>()? as u64;
        entries.push((file_at + 8 + offset, size));
    }

    let loaded = WaveArchive::load(&bytes)?;
    assert_eq!(loaded.len(), 3);
    for (i, (start, size)) in entries.into_iter().enumerate() {
        assert_eq!((start - file_at) % 0x20, 0);
        assert_eq!(loaded.entries[i].len() as u64, size);
        assert_eq!(&bytes[start as usize..(start + size) as usize], &loaded.entries[i][..]);
        assert_eq!(loaded.wave(i)?.samples[0].len(), sizes[i]);
    }
    Ok(())
}

#[test]
fn test_project_track_becomes_stream_track() -> Result<(), Error> {
    let mut project = Project::new(32000, vec![ramp(40, 11), ramp(40, -11)]);
    project.tracks = vec![Track {
        volume: 0x7F,
        pan: 0x40,
        flags: 0,
        channels: vec![0, 1],
    }];

    let stream = convert::project_to_stream(&project, SoundEncoding::Pcm16, None)?;
    let loaded = Stream::load(&stream.to_bytes()?)?;
    assert_eq!(loaded.tracks.len(), 1);
    assert_eq!(loaded.tracks[0].channels, vec![0, 1]);
    assert_eq!(loaded.info.channel_count, 2);
    Ok(())
}

#[test]
fn test_stream_round_trip_and_idempotence() -> Result<(), Error> {
    let stream = dsp_stream(30000);
    assert_eq!(stream.info.geometry.block_count, 3);

    let first = stream.to_bytes()?;
    let second = stream.to_bytes()?;
    assert_eq!(first, second);

    let loaded = Stream::load(&first)?;
    assert_eq!(loaded, stream);
    assert_eq!(loaded.to_bytes()?, first);
    Ok(())
}

#[test]
fn test_stream_file_size_field() -> Result<(), Error> {
    let bytes = dsp_stream(20000).to_bytes()?;
    let mut r = Cursor::new(&bytes);
    r.seek(SeekFrom::Start(0x0C))?;
    assert_eq!(r.read_u32::<LittleEndian>()? as usize, bytes.len());
    Ok(())
}

#[test]
fn test_stream_endian_symmetry() -> Result<(), Error> {
    let mut stream = dsp_stream(16000);
    let little = Stream::load(&stream.to_bytes()?)?;

    stream.endian = Endian::Big;
    let bytes = stream.to_bytes()?;
    assert_eq!(&bytes[0..4], b"FSTM");
    let mut r = Cursor::new(&bytes);
    r.seek(SeekFrom::Start(4))?;
    assert_eq!(r.read_u16::<BigEndian>()?, 0xFEFF);

    let mut big = Stream::load(&bytes)?;
    assert_eq!(big.endian, Endian::Big);
    big.endian = Endian::Little;
    assert_eq!(big, little);
    Ok(())
}

#[test]
fn test_pcm16_stream_endian_symmetry() -> Result<(), Error> {
    // long enough for five general blocks
    let riff = Riff::from_channels(48000, 16, &[ramp(20001, 13), ramp(20001, -13)])?;
    let mut stream = convert::riff_to_stream(&riff)?;
    assert_eq!(stream.info.geometry.block_count, 2);
    assert_eq!(stream.info.geometry.block_sample_count, 10001);
    assert_eq!(stream.info.geometry.last_block_sample_count, 10000);
    let little = Stream::load(&stream.to_bytes()?)?;

    stream.endian = Endian::Big;
    let mut big = Stream::load(&stream.to_bytes()?)?;
    big.endian = Endian::Little;
    assert_eq!(big, little);
    assert_eq!(convert::stream_to_riff(&big, None)?, riff);
    Ok(())
}

#[test]
fn test_single_block_stream() -> Result<(), Error> {
    let stream = dsp_stream(100);
    assert_eq!(stream.info.geometry.block_count, 1);
    assert_eq!(stream.info.geometry.last_block_sample_count, 100);
    assert_eq!(Stream::load(&stream.to_bytes()?)?, stream);
    Ok(())
}

#[test]
fn test_truncated_stream() -> Result<(), Error> {
    let bytes = dsp_stream(20000).to_bytes()?;
    for cut in &[0x10usize, 0x50, bytes.len() / 2, bytes.len() - 1] {
        assert!(Stream::load(&bytes[..*cut]).is_err(), "cut at 0x{:X}", cut);
    }
    Ok(())
}

fn patch_u32(bytes: &mut [u8], at: usize, value: u32) {
    bytes[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

#[test]
fn test_stream_geometry_beyond_data() -> Result<(), Error> {
    let bytes = dsp_stream(20000).to_bytes()?;
    // INFO at 0x40, stream info at INFO + 8 + 0x18
    let info_at = 0x60;

    let mut blocks = bytes.clone();
    patch_u32(&mut blocks, info_at + 0x10, u32::MAX);
    patch_u32(&mut blocks, info_at + 0x14, u32::MAX);
    assert!(Stream::load(&blocks).is_err());

    let mut seek = bytes.clone();
    patch_u32(&mut seek, info_at + 0x10, u32::MAX);
    patch_u32(&mut seek, info_at + 0x28, u32::MAX);
    assert!(Stream::load(&seek).is_err());

    let mut channels = bytes;
    channels[info_at + 2] = 200;
    assert!(Stream::load(&channels).is_err());
    Ok(())
}

#[test]
fn test_big_endian_seek_table() -> Result<(), Error> {
    let len = SoundEncoding::DspAdpcm.bytes_for_samples(30000) as usize;
    let mut stream = Stream::build(
        SoundEncoding::DspAdpcm,
        32000,
        (0..3).map(|c| ChannelCodecInfo::Dsp(dsp_info(c + 1))).collect(),
        (0..3).map(|c| vec![c as u8; len]).collect(),
        30000,
    )?;
    let seek: Vec<u8> = (0..stream.seek.as_ref().map_or(0, |t| t.len()))
        .map(|i| i as u8)
        .collect();
    // three blocks plus one, four bytes, three channels
    assert_eq!(seek.len(), 48);
    stream.seek = Some(seek);
    stream.endian = Endian::Big;

    let bytes = stream.to_bytes()?;
    let mut r = Cursor::new(&bytes);
    r.seek(SeekFrom::Start(0x14 + 12 + 4))?;
    let seek_at = r.read_u32::<BigEndian>()? as usize;
    assert_eq!(&bytes[seek_at..seek_at + 4], b"SEEK");
    assert_eq!(&bytes[seek_at + 8..seek_at + 12], &[1, 0, 3, 2]);

    assert_eq!(Stream::load(&bytes)?, stream);
    Ok(())
}

#[test]
fn test_sound_archive_round_trip() -> Result<(), Error> {
    let mut info = b"INFO".to_vec();
    info.write_u32::<BigEndian>(0x28)?;
    info.resize(0x28, 0xAB);
    let mut file = b"FILE".to_vec();
    file.write_u32::<BigEndian>(0x20)?;
    file.resize(0x20, 0xCD);

    let archive = SoundArchive {
        endian: Endian::Big,
        version: 0x0202_0000,
        strings: Some(StringBlock::build(vec![
            ("SE_JUMP".to_string(), 0x0100_0000),
            ("SE_LAND".to_string(), 0x0100_0001),
            ("BGM_FIELD".to_string(), 0x0200_0000),
        ])?),
        info,
        file,
        misc: vec![],
    };
    let bytes = archive.to_bytes()?;
    assert_eq!(&bytes[0..4], b"FSAR");

    let loaded = SoundArchive::load(&bytes)?;
    assert_eq!(loaded, archive);
    assert_eq!(loaded.find("SE_LAND"), Some(0x0100_0001));
    assert_eq!(loaded.find("BGM_FIELD"), Some(0x0200_0000));
    assert_eq!(loaded.find("SE_WALK"), None);
    assert_eq!(loaded.to_bytes()?, bytes);
    Ok(())
}

#[test]
fn test_project_file_round_trip() -> Result<(), Error> {
    let mut project = Project::new(44100, vec![ramp(10, 100); 3]);
    project.tracks = Track::stereo_pairs(3);
    project.looping = true;
    project.loop_start = 2;

    let bytes = project.to_bytes()?;
    let mut r = Cursor::new(&bytes);
    let mut magic = [0u8; 8];
    r.read_exact(&mut magic)?;
    assert_eq!(&magic, b"CISPSTRM");

    assert_eq!(Project::load(&bytes)?, project);
    Ok(())
}

#[test]
fn test_riff_wave_riff() -> Result<(), Error> {
    let riff = Riff::from_channels(22050, 8, &[vec![0u8, 0x80, 0xFF], vec![0x10u8, 0x20, 0x30]])?;
    let wave = convert::riff_to_wave(&riff)?;
    let loaded = Wave::load(&wave.to_bytes()?)?;
    assert_eq!(loaded.samples[0], vec![0x80, 0x00, 0x7F]);
    assert_eq!(convert::wave_to_riff(&loaded, None)?, riff);
    Ok(())
}

#[test]
fn test_dsp_file_fixture() -> Result<(), Error> {
    let mut f = vec![];
    f.write_u32::<BigEndian>(28)?;
    f.write_u32::<BigEndian>(32)?;
    f.write_u32::<BigEndian>(22050)?;
    f.write_u16::<BigEndian>(1)?;
    f.write_u16::<BigEndian>(0)?;
    f.write_u32::<BigEndian>(2)?;
    f.write_u32::<BigEndian>(31)?;
    f.write_u32::<BigEndian>(2)?;
    for i in 0..16i16 {
        f.write_i16::<BigEndian>(i - 8)?;
    }
    f.write_u16::<BigEndian>(0)?;
    f.write_u16::<BigEndian>(0x36)?;
    f.write_i16::<BigEndian>(-1)?;
    f.write_i16::<BigEndian>(-2)?;
    f.write_u16::<BigEndian>(0x36)?;
    f.write_i16::<BigEndian>(0)?;
    f.write_i16::<BigEndian>(0)?;
    f.resize(0x60, 0);
    f.extend(vec![0x36u8; 16]);

    let dsp = nwaudio::DspFile::load(&f)?;
    assert_eq!(dsp.sample_count, 28);
    assert!(dsp.looping);
    assert_eq!(dsp.info.coefficients[0], -8);
    assert_eq!(dsp.info.yn2, -2);
    assert_eq!(dsp.channel_data().len(), 16);
    assert_eq!(dsp.to_bytes()?, f);
    Ok(())
}
