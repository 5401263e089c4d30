use crate::segment::{Role, Segment};

/// Build a segment row with placement derived from its dbid.
pub fn segment(dbid: i32, content: i32, role: Role) -> Segment {
    Segment {
        dbid,
        content,
        role,
        preferred_role: role,
        mode: "s".into(),
        status: "u".into(),
        port: 7000 + dbid,
        hostname: format!("sdw{}", (dbid % 2) + 1),
        address: format!("sdw{}.local", (dbid % 2) + 1),
        data_directory: format!("/data/gpseg{}", content),
    }
}

/// A mirrored cluster with a coordinator, a standby and the given number of contents.
///
/// The coordinator is dbid 1, the standby is dbid 2, then primaries and mirrors follow in
/// content order, primary first.
pub fn mirrored_cluster(contents: i32) -> Vec<Segment> {
    let mut segs = vec![segment(1, -1, Role::Primary), segment(2, -1, Role::Mirror)];
    for content in 0..contents {
        let dbid = 3 + content * 2;
        segs.push(segment(dbid, content, Role::Primary));
        segs.push(segment(dbid + 1, content, Role::Mirror));
    }
    segs
}

/// A cluster without mirrors with a coordinator and the given number of contents.
pub fn mirrorless_cluster(contents: i32) -> Vec<Segment> {
    let mut segs = vec![segment(1, -1, Role::Primary)];
    for content in 0..contents {
        segs.push(segment(2 + content, content, Role::Primary));
    }
    segs
}
