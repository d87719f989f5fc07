//! Scene and survey documents in the HELIOS++ XML schema.

use std::io::Cursor;
use std::path::Path;

use constants::scanner::{
    FWF_BEAM_SAMPLE_QUALITY, FWF_BIN_SIZE_NS, HEAD_ROTATE_PER_SEC_DEG, PLATFORM_REF,
    PULSE_FREQ_HZ, SCAN_ANGLE_DEG, SCAN_FREQ_HZ, SCANNER_PROFILE_ID, SCANNER_REF,
    TRAJECTORY_TIME_INTERVAL_S,
};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};

use crate::error::AcquisitionError;
use crate::geometry::ComponentKind;
use crate::planner::ScannerPosition;

type XmlWriter = Writer<Cursor<Vec<u8>>>;

fn emit(writer: &mut XmlWriter, event: Event<'_>) -> Result<(), AcquisitionError> {
    writer
        .write_event(event)
        .map_err(|e| AcquisitionError::Xml(e.to_string()))
}

fn new_document() -> Result<XmlWriter, AcquisitionError> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 4);
    emit(
        &mut writer,
        Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)),
    )?;
    emit(&mut writer, Event::Start(BytesStart::new("document")))?;
    Ok(writer)
}

fn finish_document(mut writer: XmlWriter, path: &Path) -> Result<(), AcquisitionError> {
    emit(&mut writer, Event::End(BytesEnd::new("document")))?;
    std::fs::write(path, writer.into_inner().into_inner())?;
    Ok(())
}

/// Scene identifier shared by the scene and survey documents.
pub fn scene_id(bridge_id: &str) -> String {
    format!("TLS_{bridge_id}")
}

/// One `part` per component mesh, loaded with the OBJ filter.
pub fn write_scene(
    path: &Path,
    bridge_id: &str,
    meshes: &[(ComponentKind, std::path::PathBuf)],
) -> Result<(), AcquisitionError> {
    let mut writer = new_document()?;
    let id = scene_id(bridge_id);
    let mut scene = BytesStart::new("scene");
    scene.push_attribute(("id", id.as_str()));
    scene.push_attribute(("name", id.as_str()));
    emit(&mut writer, Event::Start(scene))?;

    for (kind, mesh_path) in meshes {
        let mut part = BytesStart::new("part");
        part.push_attribute(("id", kind.name()));
        emit(&mut writer, Event::Start(part))?;

        let mut filter = BytesStart::new("filter");
        filter.push_attribute(("type", "objloader"));
        emit(&mut writer, Event::Start(filter))?;
        let mut param = BytesStart::new("param");
        param.push_attribute(("type", "string"));
        param.push_attribute(("key", "filepath"));
        param.push_attribute(("value", &*mesh_path.to_string_lossy()));
        emit(&mut writer, Event::Empty(param))?;
        emit(&mut writer, Event::End(BytesEnd::new("filter")))?;

        emit(&mut writer, Event::End(BytesEnd::new("part")))?;
    }

    emit(&mut writer, Event::End(BytesEnd::new("scene")))?;
    finish_document(writer, path)
}

/// Survey over all given legs, referencing the scene document.
pub fn write_survey(
    path: &Path,
    bridge_id: &str,
    scene_path: &Path,
    positions: &[ScannerPosition],
) -> Result<(), AcquisitionError> {
    write_survey_named(path, &scene_id(bridge_id), bridge_id, scene_path, positions)
}

/// Survey with a caller-chosen name; single-leg runs use one per leg so their
/// outputs land in separate directories.
pub fn write_survey_named(
    path: &Path,
    survey_name: &str,
    bridge_id: &str,
    scene_path: &Path,
    positions: &[ScannerPosition],
) -> Result<(), AcquisitionError> {
    let mut writer = new_document()?;

    let mut profile = BytesStart::new("scannerSettings");
    profile.push_attribute(("id", SCANNER_PROFILE_ID));
    profile.push_attribute(("active", "true"));
    profile.push_attribute(("pulseFreq_hz", PULSE_FREQ_HZ.to_string().as_str()));
    profile.push_attribute(("scanFreq_hz", SCAN_FREQ_HZ.to_string().as_str()));
    profile.push_attribute(("scanAngle_deg", SCAN_ANGLE_DEG.to_string().as_str()));
    profile.push_attribute((
        "headRotatePerSec_deg",
        format!("{HEAD_ROTATE_PER_SEC_DEG:.1}").as_str(),
    ));
    emit(&mut writer, Event::Empty(profile))?;

    let scene_ref = format!("{}#{}", scene_path.to_string_lossy(), scene_id(bridge_id));
    let mut survey = BytesStart::new("survey");
    survey.push_attribute(("name", survey_name));
    survey.push_attribute(("scene", scene_ref.as_str()));
    survey.push_attribute(("platform", PLATFORM_REF));
    survey.push_attribute(("scanner", SCANNER_REF));
    emit(&mut writer, Event::Start(survey))?;

    let mut fwf = BytesStart::new("FWFSettings");
    fwf.push_attribute(("binSize_ns", FWF_BIN_SIZE_NS.to_string().as_str()));
    fwf.push_attribute((
        "beamSampleQuality",
        FWF_BEAM_SAMPLE_QUALITY.to_string().as_str(),
    ));
    emit(&mut writer, Event::Empty(fwf))?;

    for position in positions {
        emit(&mut writer, Event::Start(BytesStart::new("leg")))?;

        let mut platform = BytesStart::new("platformSettings");
        platform.push_attribute(("x", format!("{:.3}", position.position.x).as_str()));
        platform.push_attribute(("y", format!("{:.3}", position.position.y).as_str()));
        platform.push_attribute(("z", format!("{:.3}", position.position.z).as_str()));
        platform.push_attribute(("onGround", "false"));
        emit(&mut writer, Event::Empty(platform))?;

        let o = &position.orientation;
        let mut settings = BytesStart::new("scannerSettings");
        settings.push_attribute(("template", SCANNER_PROFILE_ID));
        for (key, value) in [
            ("verticalAngleMin_deg", o.vertical_angle_min_deg),
            ("verticalAngleMax_deg", o.vertical_angle_max_deg),
            ("headRotateStart_deg", o.head_rotate_start_deg),
            ("headRotateStop_deg", o.head_rotate_stop_deg),
            ("trajectoryTimeInterval_s", TRAJECTORY_TIME_INTERVAL_S),
        ] {
            settings.push_attribute((key, format!("{value:.1}").as_str()));
        }
        emit(&mut writer, Event::Empty(settings))?;

        emit(&mut writer, Event::End(BytesEnd::new("leg")))?;
    }

    emit(&mut writer, Event::End(BytesEnd::new("survey")))?;
    finish_document(writer, path)
}
