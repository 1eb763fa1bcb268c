use approx::assert_relative_eq;
use meridian::horizon::{metric_derivative, AdmFields, AdmQuantity, Convergence, HorizonFinder, HorizonParameters, OnePuncture};
use meridian::mesh::Mesh;
use meridian::sphere::{MeshField, SphericalGrid};




fn closed_form(r: f64) -> f64 {
    8.0 * r * (2.0 * r - 1.0) / (2.0 * r + 1.0).powi(3)
}




#[test]
fn coordinate_spheres_have_the_isotropic_schwarzschild_expansion() {
    let puncture = OnePuncture::new(1.0, [0.0; 3]);
    let g = puncture.field(AdmQuantity::Metric);
    let k = puncture.field(AdmQuantity::Curvature);
    let dg = puncture.field(AdmQuantity::MetricDerivative);
    let params = HorizonParameters::default();
    let finder = HorizonFinder::new(params, AdmFields { metric: &g, curvature: &k, metric_derivative: &dg }).unwrap();

    for r in [0.3, 0.5, 0.8, 1.5] {
        let grid = SphericalGrid::new(10, 16, r, [0.0; 3]).unwrap();
        let h = finder.expansion(&grid).unwrap();

        for theta in &h.expansion {
            assert_relative_eq!(*theta, closed_form(r), epsilon = 1e-8);
        }
    }
}

#[test]
fn search_from_a_larger_sphere_finds_the_throat() {
    let puncture = OnePuncture::new(1.0, [0.0; 3]);
    let g = puncture.field(AdmQuantity::Metric);
    let k = puncture.field(AdmQuantity::Curvature);
    let dg = puncture.field(AdmQuantity::MetricDerivative);
    let finder = HorizonFinder::new(
        HorizonParameters::default(),
        AdmFields { metric: &g, curvature: &k, metric_derivative: &dg }).unwrap();

    let search = finder.search().unwrap();

    assert_eq!(search.status, Convergence::Converged);
    assert!(search.norm <= 1e-5);
    assert!(search.iterations > 5 && search.iterations < 40);
    assert_relative_eq!(search.min_radius(), puncture.horizon_radius(), epsilon = 1e-5);
    assert_relative_eq!(search.max_radius(), puncture.horizon_radius(), epsilon = 1e-5);
    assert_eq!(search.history.len(), search.iterations + 1);
    assert_relative_eq!(search.history[0], 4.0 * std::f64::consts::PI * closed_form(0.8), epsilon = 1e-8);
}

#[test]
fn gradient_weighted_flow_finds_the_same_throat() {
    let puncture = OnePuncture::new(1.0, [0.0; 3]);
    let g = puncture.field(AdmQuantity::Metric);
    let k = puncture.field(AdmQuantity::Curvature);
    let dg = puncture.field(AdmQuantity::MetricDerivative);
    let params = HorizonParameters { weight_by_gradient: true, max_iterations: 300, ..HorizonParameters::default() };
    let finder = HorizonFinder::new(params, AdmFields { metric: &g, curvature: &k, metric_derivative: &dg }).unwrap();

    // On a coordinate sphere |∇F| = ψ⁻², so the weighted H is the plain one scaled by ψ⁻².
    let seed = SphericalGrid::new(10, 16, 0.8, [0.0; 3]).unwrap();
    let psi = 1.0 + 1.0 / (2.0 * 0.8);
    for h in finder.expansion(&seed).unwrap().expansion {
        assert_relative_eq!(h, closed_form(0.8) / (psi * psi), epsilon = 1e-8);
    }

    let search = finder.search_from(seed).unwrap();
    assert!(search.is_converged());
    assert!(search.norm <= 1e-5);
    assert_relative_eq!(search.min_radius(), 0.5, epsilon = 1e-5);
    assert_relative_eq!(search.max_radius(), 0.5, epsilon = 1e-5);
}

#[test]
fn search_on_mesh_data_lands_near_the_throat() {
    let puncture = OnePuncture::new(1.0, [0.0; 3]);
    let mesh = Mesh::uniform([-1.0; 3], [1.0; 3], [40; 3], [20; 3], 4).unwrap();
    let metric = puncture.fill_metric(&mesh).unwrap();
    let curvature = puncture.fill_curvature(&mesh).unwrap();
    let dmetric = metric_derivative(&mesh, &metric).unwrap();

    let g = MeshField::new(&mesh, &metric);
    let k = MeshField::new(&mesh, &curvature);
    let dg = MeshField::new(&mesh, &dmetric);
    let params = HorizonParameters { max_iterations: 40, ..HorizonParameters::default() };
    let finder = HorizonFinder::new(params, AdmFields { metric: &g, curvature: &k, metric_derivative: &dg }).unwrap();

    let seed = SphericalGrid::new(10, 16, 0.8, [0.0; 3]).unwrap();
    let h = finder.expansion(&seed).unwrap();
    let mean = seed.integrate(&h.expansion).unwrap() / (4.0 * std::f64::consts::PI);
    assert_relative_eq!(mean, closed_form(0.8), epsilon = 1e-3);

    let search = finder.search_from(seed).unwrap();
    assert!(search.history.last().unwrap() < &search.history[0]);
    assert!((search.min_radius() - 0.5).abs() < 1e-2);
    assert!((search.max_radius() - 0.5).abs() < 1e-2);
}
