use criterion::{criterion_group, criterion_main, Criterion, black_box};
use panelblas::{DynamicMatrix,DynamicPanelMatrix,MatrixMut,gemm,gemm_nt,syrk_ln};

fn criterion_benchmark(crit: &mut Criterion) {
    let sizes = vec![8usize,16,32,64,128];
    for size in sizes {
        let mut a = DynamicPanelMatrix::<f64>::new(size,size);
        let mut b = DynamicPanelMatrix::<f64>::new(size,size);
        let mut c = DynamicPanelMatrix::<f64>::new(size,size);
        a.randomize();
        b.randomize();
        c.randomize();
        let mut d = DynamicPanelMatrix::<f64>::new(size,size);

        crit.bench_function(&format!("dgemm panel {}",size), |crit| crit.iter(|| {
            gemm(1.0, black_box(&a), &b, 1.0, &c, &mut d)
        }));
        crit.bench_function(&format!("dgemm_nt panel {}",size), |crit| crit.iter(|| {
            gemm_nt(1.0, black_box(&a), &b, 1.0, &c, &mut d)
        }));
        crit.bench_function(&format!("dsyrk_ln panel {}",size), |crit| crit.iter(|| {
            syrk_ln(1.0, black_box(&a), 1.0, &c, &mut d)
        }));

        let mut ac = DynamicMatrix::<f64>::new(size,size);
        let mut bc = DynamicMatrix::<f64>::new(size,size);
        ac.randomize();
        bc.randomize();
        let cc = DynamicMatrix::<f64>::new(size,size);
        let mut dc = DynamicMatrix::<f64>::new(size,size);
        crit.bench_function(&format!("dgemm column-major {}",size), |crit| crit.iter(|| {
            gemm(1.0, black_box(&ac), &bc, 0.0, &cc, &mut dc)
        }));

        let mut af = DynamicPanelMatrix::<f32>::new(size,size);
        let mut bf = DynamicPanelMatrix::<f32>::new(size,size);
        af.randomize();
        bf.randomize();
        let cf = DynamicPanelMatrix::<f32>::new(size,size);
        let mut df = DynamicPanelMatrix::<f32>::new(size,size);
        crit.bench_function(&format!("sgemm panel {}",size), |crit| crit.iter(|| {
            gemm(1.0, black_box(&af), &bf, 0.0, &cf, &mut df)
        }));
    }
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
