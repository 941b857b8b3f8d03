use crate::cluster::Cluster;
use crate::io::{read_xtalsym_yaml, write_xtalsym_yaml, XtalSymFileType};

#[test]
fn test_io_file_type_extensions() {
    assert_eq!(XtalSymFileType::Orb.ext(), "xtalsym.orb");
    assert_eq!(XtalSymFileType::Dof.ext(), "xtalsym.dof");
}

#[test]
fn test_io_yaml_file() {
    let name = std::env::temp_dir().join(format!("xtalsym_io_{}", std::process::id()));
    let clusters = vec![
        Cluster::from_list(&[[0, 0, 0, 0]]).unwrap(),
        Cluster::from_list(&[[0, 0, 0, 0], [1, 0, 0, 1]]).unwrap(),
    ];
    write_xtalsym_yaml(&name, &clusters).unwrap();

    let mut path = name;
    path.set_extension("yml");
    assert!(path.exists());
    let read: Vec<Cluster> = read_xtalsym_yaml(&path).unwrap();
    assert_eq!(read, clusters);
    std::fs::remove_file(&path).unwrap();

    assert!(read_xtalsym_yaml::<Vec<Cluster>, _>(&path).is_err());
}
