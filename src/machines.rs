//! Static catalog of the machine types offered for workstation configs.
//! Listings are annotated with these specs; configs using a machine type
//! that is not in the catalog are skipped.

pub struct MachineType {
    pub name: &'static str,
    pub family: &'static str,
    pub vcpus: u32,
    pub memory_gb: f64,
}

pub const MACHINE_TYPES: &[MachineType] = &[
    MachineType { name: "e2-medium", family: "E2", vcpus: 2, memory_gb: 4.0 },
    MachineType { name: "e2-standard-2", family: "E2", vcpus: 2, memory_gb: 8.0 },
    MachineType { name: "e2-standard-4", family: "E2", vcpus: 4, memory_gb: 16.0 },
    MachineType { name: "e2-standard-8", family: "E2", vcpus: 8, memory_gb: 32.0 },
    MachineType { name: "e2-standard-16", family: "E2", vcpus: 16, memory_gb: 64.0 },
    MachineType { name: "e2-standard-32", family: "E2", vcpus: 32, memory_gb: 128.0 },
    MachineType { name: "n1-standard-1", family: "N1", vcpus: 1, memory_gb: 3.75 },
    MachineType { name: "n1-standard-2", family: "N1", vcpus: 2, memory_gb: 7.5 },
    MachineType { name: "n1-standard-4", family: "N1", vcpus: 4, memory_gb: 15.0 },
    MachineType { name: "n1-standard-8", family: "N1", vcpus: 8, memory_gb: 30.0 },
    MachineType { name: "n1-standard-16", family: "N1", vcpus: 16, memory_gb: 60.0 },
    MachineType { name: "n1-standard-32", family: "N1", vcpus: 32, memory_gb: 120.0 },
    MachineType { name: "n1-standard-64", family: "N1", vcpus: 64, memory_gb: 240.0 },
    MachineType { name: "n1-standard-96", family: "N1", vcpus: 96, memory_gb: 360.0 },
    MachineType { name: "n2-standard-2", family: "N2", vcpus: 2, memory_gb: 8.0 },
    MachineType { name: "n2-standard-4", family: "N2", vcpus: 4, memory_gb: 16.0 },
    MachineType { name: "n2-standard-8", family: "N2", vcpus: 8, memory_gb: 32.0 },
    MachineType { name: "n2-standard-16", family: "N2", vcpus: 16, memory_gb: 64.0 },
    MachineType { name: "n2-standard-32", family: "N2", vcpus: 32, memory_gb: 128.0 },
    MachineType { name: "n2d-standard-2", family: "N2D", vcpus: 2, memory_gb: 8.0 },
    MachineType { name: "n2d-standard-4", family: "N2D", vcpus: 4, memory_gb: 16.0 },
    MachineType { name: "n2d-standard-8", family: "N2D", vcpus: 8, memory_gb: 32.0 },
    MachineType { name: "n2d-standard-16", family: "N2D", vcpus: 16, memory_gb: 64.0 },
    MachineType { name: "n2d-standard-32", family: "N2D", vcpus: 32, memory_gb: 128.0 },
    MachineType { name: "n2d-highmem-2", family: "N2D Highmem", vcpus: 2, memory_gb: 16.0 },
    MachineType { name: "n2d-highmem-4", family: "N2D Highmem", vcpus: 4, memory_gb: 32.0 },
    MachineType { name: "n2d-highmem-8", family: "N2D Highmem", vcpus: 8, memory_gb: 64.0 },
    MachineType { name: "n2d-highmem-16", family: "N2D Highmem", vcpus: 16, memory_gb: 128.0 },
    MachineType { name: "n2d-highmem-32", family: "N2D Highmem", vcpus: 32, memory_gb: 256.0 },
    MachineType { name: "n2d-highmem-48", family: "N2D Highmem", vcpus: 48, memory_gb: 384.0 },
    MachineType { name: "n2d-highmem-64", family: "N2D Highmem", vcpus: 64, memory_gb: 512.0 },
    MachineType { name: "n2d-highmem-80", family: "N2D Highmem", vcpus: 80, memory_gb: 640.0 },
    MachineType { name: "n2d-highmem-96", family: "N2D Highmem", vcpus: 96, memory_gb: 768.0 },
    MachineType { name: "t2d-standard-60", family: "Tau T2D", vcpus: 60, memory_gb: 240.0 },
    MachineType { name: "a2-highgpu-1g", family: "A2", vcpus: 12, memory_gb: 85.0 },
    MachineType { name: "a2-highgpu-2g", family: "A2", vcpus: 24, memory_gb: 170.0 },
    MachineType { name: "a2-highgpu-4g", family: "A2", vcpus: 48, memory_gb: 340.0 },
    MachineType { name: "a2-highgpu-8g", family: "A2", vcpus: 96, memory_gb: 680.0 },
    MachineType { name: "a2-megagpu-16g", family: "A2", vcpus: 96, memory_gb: 1360.0 },
    MachineType { name: "a2-ultragpu-1g", family: "A2", vcpus: 12, memory_gb: 170.0 },
];

pub fn lookup(name: &str) -> Option<&'static MachineType> {
    MACHINE_TYPES.iter().find(|machine| machine.name == name)
}

impl MachineType {
    pub fn specs(&self) -> String {
        format!("machine_specs[{} vCPUs, {} GB]", self.vcpus, self.memory_gb)
    }
}
