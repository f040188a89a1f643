use gbdec_isa::Dispatcher;
use gbdec_rom::Rom;

use crate::config::ProjectConfig;
use crate::project::Project;

/// A two-bank project whose image is zero except for the given byte runs.
pub(crate) fn project_with(image: &[(u16, &[u8])], config: ProjectConfig) -> Project {
    let mut data = vec![0u8; 0x8000];
    for (at, bytes) in image {
        let start = usize::from(*at);
        data[start..start + bytes.len()].copy_from_slice(bytes);
    }
    let rom = Rom::from_bytes(data).expect("rom");
    Project::new(rom, Dispatcher::sm83().expect("catalog"), config)
}
