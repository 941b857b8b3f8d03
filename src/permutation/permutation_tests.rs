use itertools::Itertools;
use num_traits::Inv;

use crate::error::SymmetryError;
use crate::permutation::Permutation;

#[test]
fn test_permutation_rejects_invalid_images() {
    assert!(matches!(
        Permutation::from_image(vec![0, 0, 1]),
        Err(SymmetryError::GeometricInconsistency(_))
    ));
    assert!(Permutation::from_image(vec![0, 3, 1]).is_err());
    assert!(Permutation::from_image(vec![]).unwrap().is_identity());
}

#[test]
fn test_permutation_cycles() {
    let p_01234 = Permutation::from_image(vec![0, 1, 2, 3, 4]).unwrap();
    assert!(p_01234.is_identity());
    assert_eq!(p_01234.cycles(), vec![vec![0], vec![1], vec![2], vec![3], vec![4]]);
    assert_eq!(p_01234.to_string(), "()");

    let p_32104 = Permutation::from_image(vec![3, 2, 1, 0, 4]).unwrap();
    assert!(!p_32104.is_identity());
    assert_eq!(p_32104.cycles(), vec![vec![0, 3], vec![1, 2], vec![4]]);
    assert_eq!(p_32104.to_string(), "(0 3)(1 2)");

    let p_12340 = Permutation::from_image(vec![1, 2, 3, 4, 0]).unwrap();
    assert_eq!(p_12340.cycles(), vec![vec![0, 1, 2, 3, 4]]);
}

#[test]
fn test_permutation_composition() {
    let p_01234 = Permutation::identity(5);
    let p_32104 = Permutation::from_image(vec![3, 2, 1, 0, 4]).unwrap();
    assert_eq!(p_32104, &p_01234 * &p_32104);
    assert_eq!(p_32104, &p_32104 * &p_01234);

    let p_04213 = Permutation::from_image(vec![0, 4, 2, 1, 3]).unwrap();
    let p_34120 = Permutation::from_image(vec![3, 4, 1, 2, 0]).unwrap();
    assert_eq!(p_34120, &p_32104 * &p_04213);
    for i in 0..5 {
        assert_eq!(
            (&p_32104 * &p_04213).apply(i),
            p_32104.apply(p_04213.apply(i))
        );
    }

    let p_12340 = Permutation::from_image(vec![1, 2, 3, 4, 0]).unwrap();
    let p_23401 = Permutation::from_image(vec![2, 3, 4, 0, 1]).unwrap();
    assert_eq!(p_23401, &p_12340 * &p_12340);
    let p_40123 = Permutation::from_image(vec![4, 0, 1, 2, 3]).unwrap();
    assert_eq!((&p_12340).inv(), p_40123);
    assert_eq!(p_01234, &p_40123 * &p_12340);

    for image in (0..6).permutations(6) {
        let perm = Permutation::from_image(image).unwrap();
        assert!((&perm * &(&perm).inv()).is_identity());
    }
}
